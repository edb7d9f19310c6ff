//! Deep scan: the fallback when a code isn't in the local directory.

use duel_presence::{Presence, store};
use duel_protocol::{AccessCode, MatchId};

/// Walks every match id in the presence store looking for a private match
/// whose code matches `code`.
///
/// Entries that can't be fetched or parsed are logged and skipped; `None`
/// comes back only after every id was tried. If the id set itself can't
/// be read there is nothing to scan.
pub async fn deep_scan<P: Presence>(presence: &P, code: &str) -> Option<(MatchId, AccessCode)> {
    let ids = match store::match_ids(presence).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(error = %e, "deep scan could not list matches");
            return None;
        }
    };
    tracing::debug!(candidates = ids.len(), "deep scan started");

    for match_id in ids {
        let meta = match store::read_metadata(presence, match_id).await {
            Ok(Some(meta)) => meta,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(%match_id, error = %e, "deep scan skipped match");
                continue;
            }
        };
        if !meta.is_private {
            continue;
        }
        if let Some(found) = meta.access_code.filter(|c| c.matches(code)) {
            tracing::debug!(%match_id, "deep scan hit");
            return Some((match_id, found));
        }
    }
    None
}
