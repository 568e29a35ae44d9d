//! Organization chart operations
//!
//! Every read rebuilds the forest from the repository; nothing is cached.

use serde::Serialize;
use std::collections::HashSet;

use super::hierarchy::{build_forest, diagnose, DetachedEntry, OrganizationEntry};
use super::render::{render_forest, ChartCard, ChartRenderer, ManageRenderer, ManageRow, EMPTY_STATE_MESSAGE};
use super::repository::{Member, NewPosition, OrganizationRepository};
use crate::error::{AppError, AppResult, OptionExt};

const MAX_POSITION_CHARS: usize = 64;

/// Public chart page
#[derive(Debug, Serialize)]
pub struct ChartView {
    pub tree: Vec<ChartCard>,
    #[serde(rename = "emptyMessage", skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<&'static str>,
    /// Member directory, filled only while the chart is empty
    pub members: Vec<Member>,
}

/// Administrator's management page
#[derive(Debug, Serialize)]
pub struct ManageView {
    pub tree: Vec<ManageRow>,
    #[serde(rename = "emptyMessage", skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<&'static str>,
    /// Entries kept in storage but not reachable from any root
    pub detached: Vec<DetachedEntry>,
    /// Members that hold no position yet
    pub unassigned: Vec<Member>,
}

/// Request to add a position
#[derive(Debug, Clone)]
pub struct AddPosition {
    pub position: String,
    pub user_id: i64,
    pub order: i32,
    pub parent_id: Option<i64>,
}

pub async fn load_chart(repo: &dyn OrganizationRepository) -> AppResult<ChartView> {
    let entries = repo.list_entries().await?;
    let forest = build_forest(&entries)?;

    if forest.is_empty() {
        let members = repo.list_members().await?;
        return Ok(ChartView {
            tree: Vec::new(),
            empty_message: Some(EMPTY_STATE_MESSAGE),
            members,
        });
    }

    Ok(ChartView {
        tree: render_forest(&ChartRenderer, &forest),
        empty_message: None,
        members: Vec::new(),
    })
}

pub async fn load_manage(repo: &dyn OrganizationRepository) -> AppResult<ManageView> {
    let entries = repo.list_entries().await?;
    let forest = build_forest(&entries)?;
    let detached = diagnose(&entries);

    let assigned: HashSet<i64> = entries.iter().map(|e| e.user_id).collect();
    let unassigned = repo
        .list_members()
        .await?
        .into_iter()
        .filter(|m| !assigned.contains(&m.id))
        .collect();

    Ok(ManageView {
        empty_message: forest.is_empty().then_some(EMPTY_STATE_MESSAGE),
        tree: render_forest(&ManageRenderer::default(), &forest),
        detached,
        unassigned,
    })
}

fn already_assigned() -> AppError {
    AppError::Conflict("이미 직책이 배정된 회원입니다.".to_string())
}

pub async fn add_position(
    repo: &dyn OrganizationRepository,
    req: AddPosition,
) -> AppResult<OrganizationEntry> {
    let position = req.position.trim().to_string();
    if position.is_empty() || req.user_id <= 0 {
        return Err(AppError::Validation("모든 필드를 입력해주세요.".to_string()));
    }
    if position.chars().count() > MAX_POSITION_CHARS {
        return Err(AppError::Validation(format!(
            "직책명은 {}자를 넘을 수 없습니다.",
            MAX_POSITION_CHARS
        )));
    }

    repo.find_member(req.user_id)
        .await?
        .ok_or_not_found("담당자를 찾을 수 없습니다.")?;

    let entries = repo.list_entries().await?;
    if entries.iter().any(|e| e.user_id == req.user_id) {
        return Err(already_assigned());
    }
    if let Some(parent_id) = req.parent_id {
        if !entries.iter().any(|e| e.id == parent_id) {
            return Err(AppError::BadRequest("상위 직책이 존재하지 않습니다.".to_string()));
        }
    }

    let id = repo
        .insert_entry(NewPosition {
            user_id: req.user_id,
            parent_id: req.parent_id,
            position,
            order: req.order,
        })
        .await?
        .ok_or_else(already_assigned)?;

    repo.find_entry(id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("organization entry {} vanished after insert", id)))
}

/// Delete a position. Children are left in place and drop out of the chart
/// until they are re-added under another parent.
pub async fn remove_position(
    repo: &dyn OrganizationRepository,
    id: i64,
) -> AppResult<OrganizationEntry> {
    let entry = repo
        .find_entry(id)
        .await?
        .ok_or_not_found("직책을 찾을 수 없습니다.")?;

    if !repo.delete_entry(id).await? {
        return Err(AppError::NotFound("직책을 찾을 수 없습니다.".to_string()));
    }

    let orphaned = repo
        .list_entries()
        .await?
        .iter()
        .filter(|e| e.parent_id == Some(id))
        .count();
    if orphaned > 0 {
        tracing::warn!(
            "Deleted position {} ({}); {} child position(s) are now detached",
            id,
            entry.position,
            orphaned
        );
    }

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organization::hierarchy::entry;
    use crate::organization::repository::memory::MemoryOrganizationRepository;
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    fn repo_with(entries: Vec<OrganizationEntry>) -> MemoryOrganizationRepository {
        MemoryOrganizationRepository {
            entries: Mutex::new(entries),
            members: Mutex::new(vec![
                MemoryOrganizationRepository::member(10, "김회장"),
                MemoryOrganizationRepository::member(20, "이총무"),
                MemoryOrganizationRepository::member(30, "박회원"),
            ]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn chart_renders_ordered_tree() {
        let repo = repo_with(vec![entry(1, None, 0), entry(2, Some(1), 1), entry(3, Some(1), 0)]);
        let view = assert_ok!(load_chart(&repo).await);

        assert!(view.empty_message.is_none());
        assert!(view.members.is_empty());
        let child_ids: Vec<i64> = view.tree[0].children.iter().map(|c| c.id).collect();
        assert_eq!(child_ids, vec![3, 2]);
    }

    #[tokio::test]
    async fn empty_chart_shows_message_and_members() {
        let repo = repo_with(Vec::new());
        let view = assert_ok!(load_chart(&repo).await);

        assert!(view.tree.is_empty());
        assert_eq!(view.empty_message, Some(EMPTY_STATE_MESSAGE));
        let names: Vec<&str> = view.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["김회장", "박회원", "이총무"]);
    }

    #[tokio::test]
    async fn failed_read_surfaces_as_error() {
        let repo = MemoryOrganizationRepository {
            fail_reads: true,
            ..Default::default()
        };
        let err = assert_err!(load_chart(&repo).await);
        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn manage_view_lists_unassigned_and_detached() {
        let repo = repo_with(vec![entry(1, None, 0), entry(2, Some(77), 0)]);
        let view = assert_ok!(load_manage(&repo).await);

        assert_eq!(view.tree.len(), 1);
        assert_eq!(view.detached.len(), 1);
        assert_eq!(view.detached[0].entry.id, 2);
        // entry() puts user_id = id * 10, so members 10 and 20 are assigned
        let unassigned: Vec<i64> = view.unassigned.iter().map(|m| m.id).collect();
        assert_eq!(unassigned, vec![30]);
    }

    #[tokio::test]
    async fn add_position_under_existing_parent() {
        let repo = repo_with(vec![entry(1, None, 0)]);
        let added = assert_ok!(
            add_position(
                &repo,
                AddPosition {
                    position: "  총무 ".to_string(),
                    user_id: 30,
                    order: 2,
                    parent_id: Some(1),
                },
            )
            .await
        );

        assert_eq!(added.position, "총무");
        assert_eq!(added.member.name, "박회원");

        let view = assert_ok!(load_chart(&repo).await);
        assert_eq!(view.tree[0].children[0].id, added.id);
    }

    #[tokio::test]
    async fn add_position_rejects_bad_input() {
        let repo = repo_with(vec![entry(1, None, 0)]);

        let blank = add_position(
            &repo,
            AddPosition { position: " ".to_string(), user_id: 30, order: 0, parent_id: None },
        )
        .await;
        assert!(matches!(blank, Err(AppError::Validation(_))));

        let taken = add_position(
            &repo,
            AddPosition { position: "부회장".to_string(), user_id: 10, order: 0, parent_id: None },
        )
        .await;
        assert!(matches!(taken, Err(AppError::Conflict(_))));

        let dangling = add_position(
            &repo,
            AddPosition { position: "부회장".to_string(), user_id: 30, order: 0, parent_id: Some(9) },
        )
        .await;
        assert!(matches!(dangling, Err(AppError::BadRequest(_))));

        let stranger = add_position(
            &repo,
            AddPosition { position: "부회장".to_string(), user_id: 99, order: 0, parent_id: None },
        )
        .await;
        assert!(matches!(stranger, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn concurrent_add_for_same_member_conflicts_at_insert() {
        // the other admin's insert for member 30 landed after our read
        let mut repo = repo_with(vec![entry(1, None, 0)]);
        repo.stale_list = Some(vec![entry(1, None, 0)]);
        repo.entries.lock().unwrap().push(OrganizationEntry {
            user_id: 30,
            ..entry(2, Some(1), 0)
        });

        let err = assert_err!(
            add_position(
                &repo,
                AddPosition { position: "총무".to_string(), user_id: 30, order: 0, parent_id: Some(1) },
            )
            .await
        );
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(repo.entries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn removing_parent_drops_subtree_from_next_chart() {
        let repo = repo_with(vec![entry(1, None, 0), entry(2, Some(1), 0), entry(3, None, 1)]);

        let removed = assert_ok!(remove_position(&repo, 1).await);
        assert_eq!(removed.id, 1);

        let stored: Vec<i64> = repo.entries.lock().unwrap().iter().map(|e| e.id).collect();
        assert_eq!(stored, vec![2, 3]);

        let view = assert_ok!(load_chart(&repo).await);
        let roots: Vec<i64> = view.tree.iter().map(|c| c.id).collect();
        assert_eq!(roots, vec![3]);
        assert!(view.tree[0].children.is_empty());
    }

    #[tokio::test]
    async fn removing_unknown_position_is_not_found() {
        let repo = repo_with(vec![entry(1, None, 0)]);
        assert!(matches!(remove_position(&repo, 5).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn failed_delete_keeps_entry() {
        let mut repo = repo_with(vec![entry(1, None, 0)]);
        repo.fail_deletes = true;

        assert!(matches!(remove_position(&repo, 1).await, Err(AppError::Database(_))));
        assert_eq!(repo.entries.lock().unwrap().len(), 1);
    }
}
