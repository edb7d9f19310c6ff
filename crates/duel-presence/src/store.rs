//! Typed reads and writes over the raw presence layout.

use std::collections::HashMap;

use duel_protocol::{Codec, JsonCodec, ListingEntry, MatchCreated, MatchId, MatchMetadata};

use crate::{
    FIELD_CLIENTS, FIELD_MAX_CLIENTS, FIELD_METADATA, MATCHES_KEY, Presence, PresenceError,
    TOPIC_MATCH_CREATED,
};

/// Hash key holding one match's metadata.
pub fn match_key(match_id: MatchId) -> String {
    format!("match:{}", match_id.0)
}

/// Registers the match id and overwrites its metadata hash.
pub async fn write_match<P: Presence>(
    presence: &P,
    match_id: MatchId,
    metadata: &MatchMetadata,
    max_clients: usize,
) -> Result<(), PresenceError> {
    let key = match_key(match_id);
    let json = JsonCodec.encode(metadata)?;
    let json = String::from_utf8(json).map_err(|e| PresenceError::Malformed {
        key: key.clone(),
        reason: e.to_string(),
    })?;

    presence.sadd(MATCHES_KEY, &match_id.0.to_string()).await?;
    presence.hset(&key, FIELD_METADATA, &json).await?;
    presence
        .hset(&key, FIELD_CLIENTS, &metadata.player_count.to_string())
        .await?;
    presence
        .hset(&key, FIELD_MAX_CLIENTS, &max_clients.to_string())
        .await
}

pub async fn announce<P: Presence>(
    presence: &P,
    created: &MatchCreated,
) -> Result<(), PresenceError> {
    let payload = JsonCodec.encode(created)?;
    presence.publish(TOPIC_MATCH_CREATED, payload).await
}

/// Drops the match from the id set and deletes its hash.
pub async fn remove_match<P: Presence>(
    presence: &P,
    match_id: MatchId,
) -> Result<(), PresenceError> {
    presence.srem(MATCHES_KEY, &match_id.0.to_string()).await?;
    presence.del(&match_key(match_id)).await
}

/// Every id in the `matches` set. Members that aren't ids are logged and
/// skipped.
pub async fn match_ids<P: Presence>(presence: &P) -> Result<Vec<MatchId>, PresenceError> {
    let members = presence.smembers(MATCHES_KEY).await?;
    Ok(members
        .into_iter()
        .filter_map(|member| match member.parse::<u64>() {
            Ok(id) => Some(MatchId(id)),
            Err(_) => {
                tracing::warn!(%member, "non-numeric member in match set, skipping");
                None
            }
        })
        .collect())
}

/// Parsed metadata for one match, `None` when the match has no hash or
/// no metadata field.
///
/// # Errors
/// `PresenceError::Codec` when the stored JSON doesn't parse.
pub async fn read_metadata<P: Presence>(
    presence: &P,
    match_id: MatchId,
) -> Result<Option<MatchMetadata>, PresenceError> {
    let fields = presence.hgetall(&match_key(match_id)).await?;
    match fields.get(FIELD_METADATA) {
        Some(raw) => Ok(Some(JsonCodec.decode(raw.as_bytes())?)),
        None => Ok(None),
    }
}

/// One listing row, or `None` when the hash is gone.
///
/// Unparseable metadata becomes `metadata: None` so one bad match can't
/// blank the whole listing.
pub async fn read_listing<P: Presence>(
    presence: &P,
    match_id: MatchId,
) -> Result<Option<ListingEntry>, PresenceError> {
    let fields = presence.hgetall(&match_key(match_id)).await?;
    if fields.is_empty() {
        return Ok(None);
    }

    let metadata = fields
        .get(FIELD_METADATA)
        .and_then(|raw| match JsonCodec.decode::<MatchMetadata>(raw.as_bytes()) {
            Ok(meta) => Some(meta),
            Err(e) => {
                tracing::warn!(%match_id, error = %e, "unparseable match metadata");
                None
            }
        });

    Ok(Some(ListingEntry {
        match_id,
        clients: count_field(&fields, FIELD_CLIENTS),
        max_clients: count_field(&fields, FIELD_MAX_CLIENTS),
        metadata,
    }))
}

fn count_field(fields: &HashMap<String, String>, field: &str) -> usize {
    fields
        .get(field)
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalPresence;
    use duel_protocol::{AccessCode, Phase};

    fn metadata(players: usize) -> MatchMetadata {
        MatchMetadata {
            access_code: Some(AccessCode::parse("MNP234")),
            is_private: true,
            phase: Phase::Waiting,
            game_started: false,
            player_count: players,
            is_full: players == 2,
            is_empty: players == 0,
            game_winner: None,
            end_reason: None,
        }
    }

    #[tokio::test]
    async fn test_write_then_read_metadata() {
        let presence = LocalPresence::new();
        write_match(&presence, MatchId(7), &metadata(1), 2).await.unwrap();

        let meta = read_metadata(&presence, MatchId(7)).await.unwrap();
        assert_eq!(meta, Some(metadata(1)));
        assert_eq!(match_ids(&presence).await.unwrap(), vec![MatchId(7)]);
    }

    #[tokio::test]
    async fn test_read_listing_carries_client_counts() {
        let presence = LocalPresence::new();
        write_match(&presence, MatchId(3), &metadata(2), 2).await.unwrap();

        let listing = read_listing(&presence, MatchId(3)).await.unwrap().unwrap();
        assert_eq!(listing.clients, 2);
        assert_eq!(listing.max_clients, 2);
        assert!(listing.metadata.is_some());
    }

    #[tokio::test]
    async fn test_remove_match_clears_set_and_hash() {
        let presence = LocalPresence::new();
        write_match(&presence, MatchId(3), &metadata(1), 2).await.unwrap();
        remove_match(&presence, MatchId(3)).await.unwrap();

        assert!(match_ids(&presence).await.unwrap().is_empty());
        assert_eq!(read_listing(&presence, MatchId(3)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_metadata_garbage_is_codec_error() {
        let presence = LocalPresence::new();
        presence.hset("match:4", FIELD_METADATA, "{nope").await.unwrap();

        let result = read_metadata(&presence, MatchId(4)).await;
        assert!(matches!(result, Err(PresenceError::Codec(_))));
    }

    #[tokio::test]
    async fn test_read_listing_garbage_metadata_becomes_none() {
        let presence = LocalPresence::new();
        presence.hset("match:4", FIELD_METADATA, "{nope").await.unwrap();
        presence.hset("match:4", FIELD_CLIENTS, "1").await.unwrap();

        let listing = read_listing(&presence, MatchId(4)).await.unwrap().unwrap();
        assert_eq!(listing.metadata, None);
        assert_eq!(listing.clients, 1);
    }

    #[tokio::test]
    async fn test_match_ids_skips_non_numeric_members() {
        let presence = LocalPresence::new();
        presence.sadd(MATCHES_KEY, "12").await.unwrap();
        presence.sadd(MATCHES_KEY, "lobby").await.unwrap();

        assert_eq!(match_ids(&presence).await.unwrap(), vec![MatchId(12)]);
    }
}
