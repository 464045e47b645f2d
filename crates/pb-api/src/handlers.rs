//! # pb-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the core arena.

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use dashmap::DashMap;
use pb_core::{
    search_groups, Arena, BattleConfig, GroupId, GroupRepo, NewGroup, PhotoId, PhotoRepo,
    SessionSnapshot, SharedSession, UserId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ApiError;

/// State shared across all Actix-web workers.
pub struct AppState {
    pub groups: Arc<dyn GroupRepo>,
    pub arena: Arena,
    /// Live battle sessions, keyed by session id
    pub sessions: DashMap<String, SharedSession>,
}

impl AppState {
    pub fn new(photos: Arc<dyn PhotoRepo>, groups: Arc<dyn GroupRepo>, config: BattleConfig) -> Self {
        Self {
            groups,
            arena: Arena::new(photos, config),
            sessions: DashMap::new(),
        }
    }

    fn session(&self, id: &str) -> Result<SharedSession, ApiError> {
        self.sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ApiError::not_found("Session", id))
    }

    /// Closes and drops sessions whose voter has gone quiet for longer than
    /// `session_idle_secs`. Anything still in flight for them lands on a closed
    /// session and is ignored. Returns how many were evicted.
    pub async fn evict_idle_sessions(&self) -> usize {
        let idle_after = self.arena.config().session_idle();
        let live: Vec<(String, SharedSession)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut evicted = 0;
        for (session_id, session) in live {
            let mut guard = session.lock().await;
            if guard.idle_for() < idle_after {
                continue;
            }
            debug!(session_id = %session_id, voter_id = %guard.voter_id(), "evicting idle session");
            guard.close();
            drop(guard);
            self.sessions.remove(&session_id);
            evicted += 1;
        }

        if evicted > 0 {
            info!(evicted, remaining = self.sessions.len(), "idle battle sessions evicted");
        }
        evicted
    }

    async fn ensure_group(&self, id: &GroupId) -> Result<(), ApiError> {
        match self.groups.get_group(id).await.map_err(ApiError::storage)? {
            Some(_) => Ok(()),
            None => Err(ApiError::not_found("Group", id.as_str())),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GroupQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OpenSession {
    pub voter_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct CastVote {
    pub winner_photo_id: PhotoId,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
}

async fn view(session_id: String, session: &SharedSession) -> SessionView {
    let snapshot = session.lock().await.snapshot();
    SessionView { session_id, snapshot }
}

/// Lists groups, optionally filtered by `?q=` on name or description.
pub async fn list_groups(
    data: web::Data<AppState>,
    query: web::Query<GroupQuery>,
) -> Result<HttpResponse, ApiError> {
    let groups = data.groups.list_groups().await.map_err(ApiError::storage)?;
    let filtered = search_groups(groups, query.q.as_deref().unwrap_or_default());
    Ok(HttpResponse::Ok().json(filtered))
}

pub async fn create_group(
    data: web::Data<AppState>,
    body: web::Json<NewGroup>,
) -> Result<HttpResponse, ApiError> {
    let group = body.into_inner().normalized()?;
    let created = data.groups.create_group(group).await.map_err(ApiError::storage)?;
    info!(group_id = %created.id, name = %created.name, "group created");
    Ok(HttpResponse::Created().json(created))
}

pub async fn leaderboard(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let group_id = GroupId::from(path.into_inner());
    data.ensure_group(&group_id).await?;
    let photos = data.arena.leaderboard(&group_id).await?;
    Ok(HttpResponse::Ok().json(photos))
}

/// Opens a battle session for a voter and loads its first pair.
pub async fn open_session(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<OpenSession>,
) -> Result<HttpResponse, ApiError> {
    let group_id = GroupId::from(path.into_inner());
    let voter_id = body.into_inner().voter_id;
    if voter_id.is_blank() {
        return Err(pb_core::AppError::ValidationError("voter is required".into()).into());
    }
    data.ensure_group(&group_id).await?;

    let session_id = Uuid::new_v4().to_string();
    let session = data.arena.open_session(group_id.clone(), voter_id);
    data.sessions.insert(session_id.clone(), session.clone());
    info!(session_id = %session_id, group_id = %group_id, "battle session opened");

    data.arena.next_round(&session).await?;
    Ok(HttpResponse::Created().json(view(session_id, &session).await))
}

pub async fn get_session(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let session_id = path.into_inner();
    let session = data.session(&session_id)?;
    Ok(HttpResponse::Ok().json(view(session_id, &session).await))
}

/// "Next Battle": fetch a fresh pool and draw a new pair.
pub async fn next_battle(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let session_id = path.into_inner();
    let session = data.session(&session_id)?;
    data.arena.next_round(&session).await?;
    Ok(HttpResponse::Ok().json(view(session_id, &session).await))
}

/// Locks in the vote now and persists it in the background.
///
/// Answers `202` with the `voting` snapshot; clients poll the session to see
/// the outcome and the next pair.
pub async fn cast_vote(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<CastVote>,
) -> Result<HttpResponse, ApiError> {
    let session_id = path.into_inner();
    let session = data.session(&session_id)?;
    let ticket = data.arena.start_vote(&session, &body.winner_photo_id).await?;

    let arena = data.arena.clone();
    let background = session.clone();
    let id = session_id.clone();
    actix_web::rt::spawn(async move {
        if let Err(err) = arena.settle_vote(&background, ticket).await {
            warn!(session_id = %id, error = %err, "vote not recorded");
        }
    });

    Ok(HttpResponse::Accepted().json(view(session_id, &session).await))
}

/// Tears a session down. A vote still in flight lands, but the session ignores it.
pub async fn close_session(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let session_id = path.into_inner();
    let (_, session) = data
        .sessions
        .remove(&session_id)
        .ok_or_else(|| ApiError::not_found("Session", &session_id))?;
    session.lock().await.close();
    info!(session_id = %session_id, "battle session closed");
    Ok(HttpResponse::NoContent().finish())
}
