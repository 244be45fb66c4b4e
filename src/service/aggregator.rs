//! Aggregation of raw answer records into fingerprint-deduplicated units

use std::collections::HashMap;

use crate::model::{RawRecord, SubmissionUnit};

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("no qualifying records to aggregate")]
    EmptyInput,
}

/// Group records by content fingerprint, emitting one unit per distinct
/// fingerprint with the union of submitter ids.
///
/// The first record of a group acts as the representative for code and
/// diagnostic text: members of a group are assumed to share identical
/// content because the fingerprint is a hash of it. Records without a
/// fingerprint are dropped.
pub fn aggregate(records: Vec<RawRecord>) -> Result<Vec<SubmissionUnit>, AggregateError> {
    let mut units: Vec<SubmissionUnit> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let Some(fingerprint) = record.fingerprint else {
            continue;
        };

        match index.get(&fingerprint) {
            Some(&i) => units[i].user_ids.push(record.user_id),
            None => {
                index.insert(fingerprint.clone(), units.len());
                units.push(SubmissionUnit {
                    fingerprint,
                    term_id: record.term_id,
                    question_id: record.question_id,
                    user_ids: vec![record.user_id],
                    answer_code: record.answer_code.unwrap_or_default(),
                    error_info: record.error_info.unwrap_or_default(),
                });
            }
        }
    }

    if units.is_empty() {
        return Err(AggregateError::EmptyInput);
    }

    tracing::info!(units = units.len(), "aggregated submission records");
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user_id: i64, fingerprint: Option<&str>) -> RawRecord {
        RawRecord {
            term_id: 1,
            question_id: 10,
            user_id,
            answer_code: Some(format!("code-{}", fingerprint.unwrap_or("none"))),
            error_info: Some("compile error".to_string()),
            fingerprint: fingerprint.map(str::to_string),
        }
    }

    #[test]
    fn ten_records_collapse_into_three_units() {
        let mut records = Vec::new();
        for user in 0..4 {
            records.push(record(user, Some("hash-a")));
        }
        for user in 4..7 {
            records.push(record(user, Some("hash-b")));
        }
        for user in 7..10 {
            records.push(record(user, Some("hash-c")));
        }

        let units = aggregate(records).unwrap();

        assert_eq!(units.len(), 3);
        assert_eq!(units[0].fingerprint, "hash-a");
        assert_eq!(units[0].user_ids, vec![0, 1, 2, 3]);
        assert_eq!(units[1].user_count(), 3);
        assert_eq!(units[2].user_count(), 3);
    }

    #[test]
    fn representative_content_comes_from_first_member() {
        let mut first = record(1, Some("hash-a"));
        first.answer_code = Some("int main() {}".to_string());
        let units = aggregate(vec![first, record(2, Some("hash-a"))]).unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].answer_code, "int main() {}");
    }

    #[test]
    fn records_without_fingerprint_are_excluded() {
        let units = aggregate(vec![record(1, None), record(2, Some("hash-a"))]).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].user_ids, vec![2]);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(aggregate(vec![]), Err(AggregateError::EmptyInput)));
        assert!(matches!(
            aggregate(vec![record(1, None)]),
            Err(AggregateError::EmptyInput)
        ));
    }
}
