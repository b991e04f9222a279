/// publish a notification to the sink and log delivery failures instead of
/// returning them.
///
/// a transition or append that already committed must never fail because a
/// subscriber is unreachable; the sink owns redelivery.
macro_rules! notify_sink {
    ( $sink:expr, $channel:expr, $notification:expr, $target:expr ) => {
        match $sink.publish($channel, $notification) {
            Ok(_) => {}
            Err(error) => {
                error!(target: $target, "Error publishing to {}: {}", $channel, error);
            }
        }
    };
}

pub(crate) use notify_sink;
