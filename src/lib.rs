pub mod errors;

pub mod modules;

pub mod macros {
    pub mod notify;
}
