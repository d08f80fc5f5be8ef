//! Track rows over PostgREST (`/rest/v1`)

use async_trait::async_trait;
use mvault_common::{NewTrack, Track};

use super::{check, SupabaseClient};
use crate::backend::{BackendError, BackendResult, RowStore};

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl RowStore for SupabaseClient {
    async fn select_tracks(&self, owner: &str) -> BackendResult<Vec<Track>> {
        let request = self
            .authed(self.http.get(self.table_url()))?
            .query(&[
                ("select", "*".to_string()),
                ("user_id", eq(owner)),
                ("order", "created_at.desc".to_string()),
            ]);

        let response = check(request.send().await?).await?;
        response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn insert_track(&self, row: &NewTrack) -> BackendResult<Track> {
        let request = self
            .authed(self.http.post(self.table_url()))?
            .header("Prefer", "return=representation")
            .json(row);

        let response = check(request.send().await?).await?;
        let mut inserted: Vec<Track> = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        inserted
            .pop()
            .ok_or_else(|| BackendError::Decode("insert returned no row".to_string()))
    }

    /// A filter that matches no row is `NotFound`, not success
    async fn delete_track(&self, owner: &str, id: &str) -> BackendResult<()> {
        let request = self
            .authed(self.http.delete(self.table_url()))?
            .header("Prefer", "return=representation")
            .query(&[
                ("id", eq(id)),
                ("user_id", eq(owner)),
                ("select", "id".to_string()),
            ]);

        let response = check(request.send().await?).await?;
        let deleted: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        if deleted.is_empty() {
            return Err(BackendError::NotFound(format!("Track row {}", id)));
        }
        Ok(())
    }
}
