use rdkafka::{Message, error::KafkaError, message::BorrowedMessage, types::RDKafkaErrorCode};
use revstream::types::RawRecord;

/// Convert a consumed message.
/// Messages without payload become empty records so they are counted as skipped downstream
/// instead of silently disappearing.
pub(crate) fn raw_record(msg: &BorrowedMessage<'_>) -> RawRecord {
    let mut record = RawRecord::new(msg.payload().unwrap_or_default());
    if let Ok(offset) = u64::try_from(msg.offset()) {
        record = record.with_offset(offset);
    }
    if let Some(timestamp) = msg.timestamp().to_millis() {
        record = record.with_timestamp(timestamp);
    }
    record
}

/// Errors which will not go away by retrying
pub(crate) fn is_fatal(err: &KafkaError) -> bool {
    matches!(
        err.rdkafka_error_code(),
        Some(
            RDKafkaErrorCode::UnknownTopicOrPartition
                | RDKafkaErrorCode::UnknownPartition
                | RDKafkaErrorCode::UnknownTopic
                | RDKafkaErrorCode::TopicAuthorizationFailed
                | RDKafkaErrorCode::GroupAuthorizationFailed
                | RDKafkaErrorCode::Fatal
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_kafka_errors() {
        assert!(is_fatal(&KafkaError::MessageConsumption(
            RDKafkaErrorCode::UnknownTopicOrPartition
        )));
        assert!(!is_fatal(&KafkaError::MessageConsumption(
            RDKafkaErrorCode::BrokerTransportFailure
        )));
        assert!(!is_fatal(&KafkaError::Canceled));
    }
}
