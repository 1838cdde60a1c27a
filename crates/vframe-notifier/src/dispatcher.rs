//! Notification dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn, Instrument};

use vframe_clients::{UserService, VideoService};
use vframe_db::NotificationStore;
use vframe_models::{Notification, NotificationKind, NotificationMessage, User, Video};
use vframe_queue::{metrics, JobHandler};

use crate::config::NotifierConfig;
use crate::error::{NotifyError, NotifyResult};
use crate::mailer::Mailer;
use crate::templates::{EmailData, Templates, VIDEO_COMPLETED_TEMPLATE, VIDEO_FAILED_TEMPLATE};

/// Collaborators the dispatcher talks to.
#[derive(Clone)]
pub struct NotificationDeps {
    pub users: Arc<dyn UserService>,
    pub videos: Arc<dyn VideoService>,
    pub store: Arc<dyn NotificationStore>,
    pub mailer: Arc<dyn Mailer>,
}

pub struct NotificationDispatcher {
    deps: NotificationDeps,
    templates: Templates,
    public_base_url: String,
}

impl NotificationDispatcher {
    pub fn new(config: &NotifierConfig, templates: Templates, deps: NotificationDeps) -> Self {
        Self {
            deps,
            templates,
            public_base_url: config.public_base_url.clone(),
        }
    }

    /// Resolve, record, render and send one notification.
    ///
    /// Returns the final notification row on success.
    pub async fn dispatch(&self, msg: &NotificationMessage) -> NotifyResult<Notification> {
        if msg.kind.is_pipeline_outcome() && !msg.has_video() {
            return Err(NotifyError::MissingVideoId(msg.kind.clone()));
        }

        let (user, video) = self.resolve(msg).await?;

        let mut notification = Notification::pending(
            &msg.user_id,
            video.as_ref().map(|v| v.id.clone()),
            msg.kind.clone(),
            &msg.subject,
            &msg.message,
            &user.email,
        );
        self.deps
            .store
            .create_notification(&notification)
            .await
            .map_err(NotifyError::Persist)?;

        let body = match self.render(msg, &user, video.as_ref()) {
            Ok(body) => body,
            Err(e) => {
                notification.mark_render_failed(e.to_string());
                self.save(&notification).await;
                metrics::record_notification("failed");
                return Err(e);
            }
        };

        if let Err(e) = self.deps.mailer.send(&user.email, &msg.subject, &body).await {
            notification.mark_send_failed(e.to_string());
            self.save(&notification).await;
            metrics::record_notification("failed");
            return Err(NotifyError::Send(e));
        }

        notification.mark_sent();
        self.save(&notification).await;
        metrics::record_notification("sent");
        info!(
            notification_id = %notification.id,
            video_id = %msg.video_id,
            kind = %msg.kind,
            "Notification sent"
        );
        Ok(notification)
    }

    /// Look up the user and, when referenced, the video concurrently.
    async fn resolve(&self, msg: &NotificationMessage) -> NotifyResult<(User, Option<Video>)> {
        let user = async {
            self.deps
                .users
                .get_user(&msg.user_id)
                .await
                .map_err(NotifyError::UserLookup)
        };
        let video = async {
            if !msg.has_video() {
                return Ok(None);
            }
            self.deps
                .videos
                .get_video(&msg.video_id)
                .await
                .map(Some)
                .map_err(NotifyError::VideoLookup)
        };

        let (user, video) = tokio::join!(user, video);
        Ok((user?, video?))
    }

    fn render(
        &self,
        msg: &NotificationMessage,
        user: &User,
        video: Option<&Video>,
    ) -> NotifyResult<String> {
        match (&msg.kind, video) {
            (NotificationKind::VideoCompleted, Some(video)) => self.templates.render(
                VIDEO_COMPLETED_TEMPLATE,
                &EmailData::completed(user, video, &self.public_base_url),
            ),
            (NotificationKind::VideoFailed, Some(video)) => self
                .templates
                .render(VIDEO_FAILED_TEMPLATE, &EmailData::failed(user, video)),
            _ => Ok(msg.message.clone()),
        }
    }

    async fn save(&self, notification: &Notification) {
        if let Err(e) = self.deps.store.update_notification(notification).await {
            warn!(
                notification_id = %notification.id,
                status = notification.status.as_str(),
                error = %e,
                "Failed to update notification record"
            );
        }
    }
}

#[async_trait]
impl JobHandler for NotificationDispatcher {
    type Error = NotifyError;

    async fn handle(&self, worker_id: usize, payload: &[u8]) -> Result<(), NotifyError> {
        let msg: NotificationMessage = serde_json::from_slice(payload)?;
        let span = tracing::info_span!(
            "notification_job",
            worker_id,
            video_id = %msg.video_id,
            kind = %msg.kind
        );
        self.dispatch(&msg).instrument(span).await?;
        Ok(())
    }
}
