//! Hue bridge adapter: group/scene lookup and schedule management over the
//! bridge's local REST API.
//!
//! Every schedule this tool creates carries the description "Calendar", so
//! a later run can find and delete exactly its own schedules before
//! publishing fresh ones.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::SceneNames;
use huecal_core::SceneAction;

/// Provenance tag on every schedule created by this tool
pub const SCHEDULE_TAG: &str = "Calendar";

pub struct HueBridge {
    http: reqwest::Client,
    /// "http://{host}/api/{app_key}"
    base: String,
    app_key: String,
}

/// What a schedule switches the group to
#[derive(Debug, Clone, Serialize)]
pub struct GroupAction {
    pub on: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
}

/// Bridge scene ids resolved from the configured scene names
#[derive(Debug, Clone)]
pub struct SceneIds {
    pub meeting: String,
    pub meeting_soon: String,
    pub meeting_later: String,
    pub chill: String,
}

impl SceneIds {
    /// The group action for a timeline scene change
    pub fn action_for(&self, scene: SceneAction) -> GroupAction {
        let scene_id = match scene {
            SceneAction::MeetingNow => Some(self.meeting.clone()),
            SceneAction::MeetingSoon => Some(self.meeting_soon.clone()),
            SceneAction::MeetingLater => Some(self.meeting_later.clone()),
            SceneAction::Chill => Some(self.chill.clone()),
            SceneAction::LightsOff => None,
        };
        GroupAction {
            on: scene != SceneAction::LightsOff,
            scene: scene_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NamedResource {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ScheduleInfo {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Serialize)]
struct ScheduleCommand {
    address: String,
    method: String,
    body: GroupAction,
}

#[derive(Debug, Serialize)]
struct CreateSchedule {
    name: String,
    description: String,
    localtime: String,
    command: ScheduleCommand,
}

impl HueBridge {
    pub fn new(host: &str, app_key: &str) -> Self {
        HueBridge {
            http: reqwest::Client::new(),
            base: format!("http://{}/api/{}", host, app_key),
            app_key: app_key.to_string(),
        }
    }

    /// Look up a group (room) id by its name
    pub async fn group_id(&self, name: &str) -> Result<String> {
        let groups: HashMap<String, NamedResource> = self
            .http
            .get(format!("{}/groups", self.base))
            .send()
            .await
            .context("Failed to fetch groups from bridge")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse groups response")?;

        groups
            .into_iter()
            .find(|(_, g)| g.name == name)
            .map(|(id, _)| id)
            .with_context(|| format!("No group named '{}' on the bridge", name))
    }

    /// Look up a scene id by its name
    pub async fn scene_id(&self, name: &str) -> Result<String> {
        let scenes: HashMap<String, NamedResource> = self
            .http
            .get(format!("{}/scenes", self.base))
            .send()
            .await
            .context("Failed to fetch scenes from bridge")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse scenes response")?;

        scenes
            .into_iter()
            .find(|(_, s)| s.name == name)
            .map(|(id, _)| id)
            .with_context(|| format!("No scene named '{}' on the bridge", name))
    }

    /// Resolve all four configured scene names at once
    pub async fn resolve_scenes(&self, names: &SceneNames) -> Result<SceneIds> {
        Ok(SceneIds {
            meeting: self.scene_id(&names.meeting).await?,
            meeting_soon: self.scene_id(&names.meeting_soon).await?,
            meeting_later: self.scene_id(&names.meeting_later).await?,
            chill: self.scene_id(&names.chill).await?,
        })
    }

    /// Delete every schedule previously created by this tool.
    /// Returns how many were removed.
    pub async fn clear_own_schedules(&self) -> Result<usize> {
        let schedules: HashMap<String, ScheduleInfo> = self
            .http
            .get(format!("{}/schedules", self.base))
            .send()
            .await
            .context("Failed to fetch schedules from bridge")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse schedules response")?;

        let mut count = 0;
        for (id, schedule) in schedules {
            if schedule.description == SCHEDULE_TAG {
                self.http
                    .delete(format!("{}/schedules/{}", self.base, id))
                    .send()
                    .await
                    .with_context(|| format!("Failed to delete schedule {}", id))?
                    .error_for_status()?;
                count += 1;
            }
        }

        Ok(count)
    }

    /// Create a schedule that applies `action` to `group_id` at `at` (local
    /// bridge time), tagged so a later run can find it again.
    pub async fn create_group_schedule(
        &self,
        name: &str,
        at: NaiveDateTime,
        group_id: &str,
        action: GroupAction,
    ) -> Result<()> {
        let body = CreateSchedule {
            name: name.to_string(),
            description: SCHEDULE_TAG.to_string(),
            localtime: at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            command: ScheduleCommand {
                // The address is relative to the bridge root, app key included
                address: format!("/api/{}/groups/{}/action", self.app_key, group_id),
                method: "PUT".to_string(),
                body: action,
            },
        };

        let response: serde_json::Value = self
            .http
            .post(format!("{}/schedules", self.base))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to create schedule '{}'", name))?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse schedule creation response")?;

        check_bridge_response(&response)?;

        Ok(())
    }
}

/// The bridge reports failures as 200 OK with an error envelope:
/// `[{"error": {"type": .., "description": ..}}]`
fn check_bridge_response(response: &serde_json::Value) -> Result<()> {
    if let Some(items) = response.as_array() {
        for item in items {
            if let Some(error) = item.get("error") {
                let description = error
                    .get("description")
                    .and_then(|d| d.as_str())
                    .unwrap_or("unknown bridge error");
                anyhow::bail!("Bridge error: {}", description);
            }
        }
    }
    Ok(())
}
