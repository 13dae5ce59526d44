use anyhow::Result;
use duckdb::Connection;
use serde::{Deserialize, Serialize};

use crate::backend::generate_id;
use crate::DuckDbBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Sent,
}

impl CampaignStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Sent => "sent",
        }
    }

    fn from_db(raw: &str) -> Self {
        match raw {
            "sent" => CampaignStatus::Sent,
            _ => CampaignStatus::Draft,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Campaign {
    pub id: String,
    pub storefront_id: String,
    pub subject: String,
    pub body: String,
    pub status: CampaignStatus,
    /// Subscriber count captured when the campaign was sent.
    pub recipients: i64,
    pub sent_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CreateCampaignParams {
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct UpdateCampaignParams {
    pub subject: Option<String>,
    pub body: Option<String>,
}

/// Result of a mutation that is only allowed on drafts.
#[derive(Debug)]
pub enum CampaignOutcome {
    Done(Campaign),
    NotFound,
    NotDraft,
}

const CAMPAIGN_COLUMNS: &str = "id, storefront_id, subject, body, status, recipients, \
     CAST(sent_at AS VARCHAR), CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR)";

fn campaign_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Campaign> {
    let status: String = row.get(4)?;
    Ok(Campaign {
        id: row.get(0)?,
        storefront_id: row.get(1)?,
        subject: row.get(2)?,
        body: row.get(3)?,
        status: CampaignStatus::from_db(&status),
        recipients: row.get(5)?,
        sent_at: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn select_campaign(conn: &Connection, storefront_id: &str, id: &str) -> Result<Option<Campaign>> {
    let sql =
        format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1 AND storefront_id = ?2");
    let campaign = conn
        .prepare(&sql)?
        .query_row(duckdb::params![id, storefront_id], campaign_from_row)
        .ok();
    Ok(campaign)
}

impl DuckDbBackend {
    pub async fn create_campaign(
        &self,
        storefront_id: &str,
        params: CreateCampaignParams,
    ) -> Result<Campaign> {
        let conn = self.conn.lock().await;
        let id = generate_id("cmp");
        conn.execute(
            "INSERT INTO campaigns (id, storefront_id, subject, body, status, recipients, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, 'draft', 0, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
            duckdb::params![id, storefront_id, params.subject, params.body],
        )?;

        select_campaign(&conn, storefront_id, &id)?
            .ok_or_else(|| anyhow::anyhow!("campaign {id} vanished after insert"))
    }

    /// Campaigns, newest first.
    pub async fn list_campaigns(&self, storefront_id: &str) -> Result<Vec<Campaign>> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE storefront_id = ?1 \
             ORDER BY created_at DESC, id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(duckdb::params![storefront_id], campaign_from_row)?;

        let mut campaigns = Vec::new();
        for row in rows {
            campaigns.push(row?);
        }
        Ok(campaigns)
    }

    pub async fn get_campaign(&self, storefront_id: &str, id: &str) -> Result<Option<Campaign>> {
        let conn = self.conn.lock().await;
        select_campaign(&conn, storefront_id, id)
    }

    pub async fn update_campaign(
        &self,
        storefront_id: &str,
        id: &str,
        params: UpdateCampaignParams,
    ) -> Result<CampaignOutcome> {
        let conn = self.conn.lock().await;
        match select_campaign(&conn, storefront_id, id)? {
            None => return Ok(CampaignOutcome::NotFound),
            Some(c) if c.status != CampaignStatus::Draft => return Ok(CampaignOutcome::NotDraft),
            Some(_) => {}
        }

        if let Some(ref subject) = params.subject {
            conn.execute(
                "UPDATE campaigns SET subject = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![subject, id],
            )?;
        }
        if let Some(ref body) = params.body {
            conn.execute(
                "UPDATE campaigns SET body = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                duckdb::params![body, id],
            )?;
        }

        match select_campaign(&conn, storefront_id, id)? {
            Some(campaign) => Ok(CampaignOutcome::Done(campaign)),
            None => Ok(CampaignOutcome::NotFound),
        }
    }

    /// Delete a campaign. Clicks attributed to it are kept.
    pub async fn delete_campaign(&self, storefront_id: &str, id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let deleted = conn.execute(
            "DELETE FROM campaigns WHERE id = ?1 AND storefront_id = ?2",
            duckdb::params![id, storefront_id],
        )?;
        Ok(deleted > 0)
    }

    /// Mark a draft as sent, capturing the current subscriber count as its
    /// recipient total.
    pub async fn mark_campaign_sent(&self, storefront_id: &str, id: &str) -> Result<CampaignOutcome> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        match select_campaign(&tx, storefront_id, id)? {
            None => return Ok(CampaignOutcome::NotFound),
            Some(c) if c.status != CampaignStatus::Draft => return Ok(CampaignOutcome::NotDraft),
            Some(_) => {}
        }

        let recipients: i64 = tx
            .prepare("SELECT COUNT(*) FROM subscribers WHERE storefront_id = ?1")?
            .query_row(duckdb::params![storefront_id], |row| row.get(0))?;
        tx.execute(
            "UPDATE campaigns SET status = ?1, recipients = ?2, sent_at = CURRENT_TIMESTAMP, \
             updated_at = CURRENT_TIMESTAMP WHERE id = ?3",
            duckdb::params![CampaignStatus::Sent.as_str(), recipients, id],
        )?;
        tx.commit()?;

        match select_campaign(&conn, storefront_id, id)? {
            Some(campaign) => Ok(CampaignOutcome::Done(campaign)),
            None => Ok(CampaignOutcome::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_db_text() {
        assert_eq!(CampaignStatus::from_db("sent"), CampaignStatus::Sent);
        assert_eq!(CampaignStatus::from_db("draft"), CampaignStatus::Draft);
        assert_eq!(CampaignStatus::Sent.as_str(), "sent");
        assert_eq!(
            serde_json::to_string(&CampaignStatus::Draft).expect("serialize"),
            "\"draft\""
        );
    }
}
