//! REST implementation of the room gateway.
//!
//! Talks to the platform's HTTP API with a bearer token. Status codes map
//! onto the error taxonomy (403 forbidden, 404 not found, 429 rate limited,
//! everything else "other"); retry and timeout policy live in [`super::Retry`],
//! not here, apart from the client-level connect timeout.

use super::{RemoteError, RemoteResult, RoomGateway};
use crate::config::RemoteConfig;
use crate::ids::{ChannelId, GuildId, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Channel kinds understood by the platform's create-channel endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum ChannelKind {
    Voice,
    Category,
    Text,
}

#[derive(Debug, Serialize)]
struct CreateChannelBody<'a> {
    name: &'a str,
    kind: ChannelKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<ChannelId>,
}

#[derive(Debug, Deserialize)]
struct ChannelBody {
    id: ChannelId,
}

#[derive(Debug, Serialize)]
struct VoiceMoveBody {
    channel_id: Option<ChannelId>,
}

#[derive(Debug, Serialize)]
struct ConnectPermissionBody {
    connect: bool,
}

#[derive(Debug, Serialize)]
struct EditChannelBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_limit: Option<u16>,
}

#[derive(Debug, Serialize)]
struct CreateInviteBody {
    max_age_secs: u32,
    max_uses: u16,
}

#[derive(Debug, Deserialize)]
struct InviteBody {
    url: String,
}

#[derive(Debug, Serialize)]
struct MessageBody<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OccupantsBody {
    occupants: Vec<UserId>,
}

#[derive(Debug, Deserialize)]
struct VoiceStateBody {
    channel_id: Option<ChannelId>,
}

/// `reqwest`-backed room gateway.
pub struct HttpRoomGateway {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpRoomGateway {
    pub fn new(config: &RemoteConfig) -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| RemoteError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Map a response to the error taxonomy, keeping the request path (never
    /// the body) as context.
    async fn check(resp: reqwest::Response, path: &str) -> RemoteResult<reqwest::Response> {
        match resp.status().as_u16() {
            200..=299 => Ok(resp),
            403 => Err(RemoteError::Forbidden(path.to_string())),
            404 => Err(RemoteError::NotFound(path.to_string())),
            429 => Err(RemoteError::RateLimited),
            status => Err(RemoteError::Other(format!("{path}: HTTP {status}"))),
        }
    }

    fn transport(err: reqwest::Error, path: &str) -> RemoteError {
        if err.is_timeout() {
            RemoteError::Other(format!("{path}: request timed out"))
        } else {
            RemoteError::Other(format!("{path}: {err}"))
        }
    }

    async fn send_json<B: Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> RemoteResult<reqwest::Response> {
        let resp = self
            .http
            .request(method, self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| Self::transport(e, path))?;
        Self::check(resp, path).await
    }

    async fn create_channel(
        &self,
        guild: GuildId,
        name: &str,
        kind: ChannelKind,
        parent: Option<ChannelId>,
    ) -> RemoteResult<ChannelId> {
        let path = format!("guilds/{guild}/channels");
        let body = CreateChannelBody {
            name,
            kind,
            parent_id: parent,
        };
        let resp = self.send_json(reqwest::Method::POST, &path, &body).await?;
        let created: ChannelBody = resp
            .json()
            .await
            .map_err(|e| Self::transport(e, &path))?;
        Ok(created.id)
    }
}

#[async_trait]
impl RoomGateway for HttpRoomGateway {
    async fn create_voice_channel(
        &self,
        guild: GuildId,
        name: &str,
        parent: Option<ChannelId>,
    ) -> RemoteResult<ChannelId> {
        self.create_channel(guild, name, ChannelKind::Voice, parent).await
    }

    async fn create_category(&self, guild: GuildId, name: &str) -> RemoteResult<ChannelId> {
        self.create_channel(guild, name, ChannelKind::Category, None).await
    }

    async fn create_text_channel(
        &self,
        guild: GuildId,
        name: &str,
        parent: Option<ChannelId>,
    ) -> RemoteResult<ChannelId> {
        self.create_channel(guild, name, ChannelKind::Text, parent).await
    }

    async fn delete_channel(&self, guild: GuildId, channel: ChannelId) -> RemoteResult<()> {
        let path = format!("guilds/{guild}/channels/{channel}");
        let resp = self
            .http
            .delete(self.url(&path))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Self::transport(e, &path))?;
        Self::check(resp, &path).await?;
        Ok(())
    }

    async fn move_member(
        &self,
        guild: GuildId,
        member: UserId,
        to: Option<ChannelId>,
    ) -> RemoteResult<()> {
        let path = format!("guilds/{guild}/members/{member}/voice");
        self.send_json(reqwest::Method::PATCH, &path, &VoiceMoveBody { channel_id: to })
            .await?;
        Ok(())
    }

    async fn set_connect_permission(
        &self,
        guild: GuildId,
        channel: ChannelId,
        member: UserId,
        allowed: bool,
    ) -> RemoteResult<()> {
        let path = format!("guilds/{guild}/channels/{channel}/permissions/{member}");
        self.send_json(
            reqwest::Method::PUT,
            &path,
            &ConnectPermissionBody { connect: allowed },
        )
        .await?;
        Ok(())
    }

    async fn set_everyone_connect(
        &self,
        guild: GuildId,
        channel: ChannelId,
        allowed: bool,
    ) -> RemoteResult<()> {
        let path = format!("guilds/{guild}/channels/{channel}/permissions/everyone");
        self.send_json(
            reqwest::Method::PUT,
            &path,
            &ConnectPermissionBody { connect: allowed },
        )
        .await?;
        Ok(())
    }

    async fn rename_channel(
        &self,
        guild: GuildId,
        channel: ChannelId,
        name: &str,
    ) -> RemoteResult<()> {
        let path = format!("guilds/{guild}/channels/{channel}");
        self.send_json(
            reqwest::Method::PATCH,
            &path,
            &EditChannelBody {
                name: Some(name),
                user_limit: None,
            },
        )
        .await?;
        Ok(())
    }

    async fn set_user_limit(
        &self,
        guild: GuildId,
        channel: ChannelId,
        limit: u16,
    ) -> RemoteResult<()> {
        let path = format!("guilds/{guild}/channels/{channel}");
        self.send_json(
            reqwest::Method::PATCH,
            &path,
            &EditChannelBody {
                name: None,
                user_limit: Some(limit),
            },
        )
        .await?;
        Ok(())
    }

    async fn create_invite(
        &self,
        guild: GuildId,
        channel: ChannelId,
        max_age_secs: u32,
        max_uses: u16,
    ) -> RemoteResult<String> {
        let path = format!("guilds/{guild}/channels/{channel}/invites");
        let resp = self
            .send_json(
                reqwest::Method::POST,
                &path,
                &CreateInviteBody {
                    max_age_secs,
                    max_uses,
                },
            )
            .await?;
        let invite: InviteBody = resp
            .json()
            .await
            .map_err(|e| Self::transport(e, &path))?;
        Ok(invite.url)
    }

    async fn post_message(
        &self,
        guild: GuildId,
        channel: ChannelId,
        text: &str,
    ) -> RemoteResult<()> {
        let path = format!("guilds/{guild}/channels/{channel}/messages");
        self.send_json(reqwest::Method::POST, &path, &MessageBody { content: text })
            .await?;
        Ok(())
    }

    async fn occupants(&self, guild: GuildId, channel: ChannelId) -> RemoteResult<Vec<UserId>> {
        let path = format!("guilds/{guild}/channels/{channel}/occupants");
        let resp = self
            .http
            .get(self.url(&path))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Self::transport(e, &path))?;
        let resp = Self::check(resp, &path).await?;
        let body: OccupantsBody = resp
            .json()
            .await
            .map_err(|e| Self::transport(e, &path))?;
        Ok(body.occupants)
    }

    async fn current_channel(
        &self,
        guild: GuildId,
        member: UserId,
    ) -> RemoteResult<Option<ChannelId>> {
        let path = format!("guilds/{guild}/members/{member}/voice");
        let resp = self
            .http
            .get(self.url(&path))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Self::transport(e, &path))?;

        // A member with no voice session is reported as 404 by some platform
        // versions and as `channel_id: null` by others. Both mean "not in voice".
        match Self::check(resp, &path).await {
            Ok(resp) => {
                let body: VoiceStateBody = resp
                    .json()
                    .await
                    .map_err(|e| Self::transport(e, &path))?;
                Ok(body.channel_id)
            }
            Err(RemoteError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
