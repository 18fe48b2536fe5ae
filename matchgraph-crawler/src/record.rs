use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One match payload as returned by the detail endpoint.
///
/// Only the metadata block is interpreted by the crawler (match id for
/// dedup, participant PUUIDs for frontier expansion). The info block and
/// any other fields ride along untouched so the persisted shards keep the
/// exact shape downstream feature extraction expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub metadata: MatchMetadata,
    #[serde(default)]
    pub info: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchMetadata {
    #[serde(rename = "matchId")]
    pub match_id: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MatchRecord {
    pub fn participants(&self) -> &[String] {
        &self.metadata.participants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trip_preserves_unknown_fields() {
        let payload = json!({
            "metadata": {
                "dataVersion": "2",
                "matchId": "KR_1234",
                "participants": ["puuid-a", "puuid-b"]
            },
            "info": {
                "gameDuration": 1400,
                "queueId": 450,
                "participants": [
                    { "puuid": "puuid-a", "championName": "Lux", "kills": 7 },
                    { "puuid": "puuid-b", "championName": "Jinx", "kills": 2 }
                ]
            }
        });

        let record: MatchRecord = serde_json::from_value(payload.clone()).unwrap();
        assert_eq!(record.metadata.match_id, "KR_1234");
        assert_eq!(record.participants(), ["puuid-a", "puuid-b"]);

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn missing_participants_defaults_to_empty() {
        let record: MatchRecord = serde_json::from_value(json!({
            "metadata": { "matchId": "KR_1" }
        }))
        .unwrap();
        assert!(record.participants().is_empty());
    }
}
