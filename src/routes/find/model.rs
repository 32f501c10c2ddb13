use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::pagination::{self, Cursor, Page};

// 战利品列表默认页大小
const DEFAULT_PAGE_SIZE: i64 = 9;

#[derive(Debug, FromRow)]
pub struct Find {
    pub id: i64,
    pub group_id: String,
    pub name: String,
    pub description: Option<String>,
    pub found_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct Reaction {
    pub find_id: i64,
    pub account_name: String,
    pub emoji: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionInfo {
    pub account_name: String,
    pub emoji: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindInfo {
    pub id: i64,
    pub group_id: String,
    pub name: String,
    pub description: Option<String>,
    pub found_by: String,
    pub created_at: DateTime<Utc>,
    pub reactions: Vec<ReactionInfo>,
}

impl FindInfo {
    fn new(find: Find, reactions: Vec<ReactionInfo>) -> Self {
        Self {
            id: find.id,
            group_id: find.group_id,
            name: find.name,
            description: find.description,
            found_by: find.found_by,
            created_at: find.created_at,
            reactions,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFindRequest {
    pub group_id: String,
    pub name: String,
    pub description: Option<String>,
    pub found_by: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFindRequest {
    pub find_id: i64,
    pub account_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRequest {
    pub find_id: i64,
    pub account_name: String,
    pub emoji: String,
}

fn build_list_query(group_id: &str, cursor: Option<&Cursor>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT id, group_id, name, description, found_by, created_at \
         FROM finds WHERE group_id = ",
    );
    qb.push_bind(group_id.to_string());
    if let Some(cursor) = cursor {
        pagination::push_cursor_bound(&mut qb, cursor);
    }
    qb
}

impl Find {
    pub async fn list(
        pool: &PgPool,
        group_id: &str,
        limit: Option<i64>,
        cursor: Option<Cursor>,
    ) -> Result<Page<FindInfo>, sqlx::Error> {
        let limit = pagination::clamp_limit(limit, DEFAULT_PAGE_SIZE);

        let mut qb = build_list_query(group_id, cursor.as_ref());
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit + 1);

        let rows: Vec<Find> = qb.build_query_as().fetch_all(pool).await?;
        let page = Page::from_rows(rows, limit, |find| Cursor {
            id: find.id,
            created_at: find.created_at,
        });

        // 当页的反应一次取出，按 find_id 归组
        let find_ids: Vec<i64> = page.items.iter().map(|find| find.id).collect();
        let reactions = Reaction::for_finds(pool, &find_ids).await?;
        let mut grouped = group_reactions(reactions);

        let items = page
            .items
            .into_iter()
            .map(|find| {
                let reactions = grouped.remove(&find.id).unwrap_or_default();
                FindInfo::new(find, reactions)
            })
            .collect();

        Ok(Page {
            items,
            next_cursor: page.next_cursor,
        })
    }

    pub async fn create(pool: &PgPool, req: CreateFindRequest) -> Result<FindInfo, sqlx::Error> {
        let find: Find = sqlx::query_as(
            r#"
            INSERT INTO finds (group_id, name, description, found_by, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, group_id, name, description, found_by, created_at
            "#,
        )
        .bind(&req.group_id)
        .bind(&req.name)
        .bind(&req.description)
        .bind(&req.found_by)
        .fetch_one(pool)
        .await?;

        Ok(FindInfo::new(find, Vec::new()))
    }

    pub async fn delete(
        pool: &PgPool,
        find_id: i64,
        account_name: &str,
    ) -> Result<(), sqlx::Error> {
        let found_by: String = sqlx::query_scalar("SELECT found_by FROM finds WHERE id = $1")
            .bind(find_id)
            .fetch_optional(pool)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        if found_by != account_name {
            return Err(sqlx::Error::Protocol(
                "Only the finder can delete a find".into(),
            ));
        }

        sqlx::query("DELETE FROM find_reactions WHERE find_id = $1")
            .bind(find_id)
            .execute(pool)
            .await?;

        sqlx::query("DELETE FROM finds WHERE id = $1")
            .bind(find_id)
            .execute(pool)
            .await?;

        Ok(())
    }
}

impl Reaction {
    async fn for_finds(pool: &PgPool, find_ids: &[i64]) -> Result<Vec<Reaction>, sqlx::Error> {
        if find_ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as(
            r#"
            SELECT find_id, account_name, emoji
            FROM find_reactions
            WHERE find_id = ANY($1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(find_ids.to_vec())
        .fetch_all(pool)
        .await
    }

    pub async fn add(pool: &PgPool, req: ReactionRequest) -> Result<(), sqlx::Error> {
        let find_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM finds WHERE id = $1)")
            .bind(req.find_id)
            .fetch_one(pool)
            .await?;

        if !find_exists {
            return Err(sqlx::Error::RowNotFound);
        }

        // 同一账号对同一战利品的重复反应不再落库
        let already_reacted: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM find_reactions
                WHERE find_id = $1 AND account_name = $2 AND emoji = $3
            )
            "#,
        )
        .bind(req.find_id)
        .bind(&req.account_name)
        .bind(&req.emoji)
        .fetch_one(pool)
        .await?;

        if already_reacted {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO find_reactions (find_id, account_name, emoji, created_at)
            VALUES ($1, $2, $3, NOW())
            "#,
        )
        .bind(req.find_id)
        .bind(&req.account_name)
        .bind(&req.emoji)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn remove(pool: &PgPool, req: ReactionRequest) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM find_reactions
            WHERE find_id = $1 AND account_name = $2 AND emoji = $3
            "#,
        )
        .bind(req.find_id)
        .bind(&req.account_name)
        .bind(&req.emoji)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}

fn group_reactions(reactions: Vec<Reaction>) -> HashMap<i64, Vec<ReactionInfo>> {
    let mut grouped: HashMap<i64, Vec<ReactionInfo>> = HashMap::new();
    for reaction in reactions {
        grouped
            .entry(reaction.find_id)
            .or_default()
            .push(ReactionInfo {
                account_name: reaction.account_name,
                emoji: reaction.emoji,
            });
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn list_query_without_cursor() {
        let qb = build_list_query("group-1", None);
        assert_eq!(
            qb.sql(),
            "SELECT id, group_id, name, description, found_by, created_at \
             FROM finds WHERE group_id = $1"
        );
    }

    #[test]
    fn list_query_with_cursor_appends_tuple_bound() {
        let cursor = Cursor {
            id: 12,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        };
        let qb = build_list_query("group-1", Some(&cursor));
        assert!(qb.sql().ends_with(
            "WHERE group_id = $1 AND (created_at < $2 OR (created_at = $3 AND id < $4))"
        ));
    }

    #[test]
    fn reactions_group_by_find_and_keep_order() {
        let reactions = vec![
            Reaction {
                find_id: 1,
                account_name: "Alice".into(),
                emoji: "🔥".into(),
            },
            Reaction {
                find_id: 2,
                account_name: "Bob".into(),
                emoji: "🎉".into(),
            },
            Reaction {
                find_id: 1,
                account_name: "Bob".into(),
                emoji: "🔥".into(),
            },
        ];

        let grouped = group_reactions(reactions);
        assert_eq!(grouped.len(), 2);
        let first = &grouped[&1];
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].account_name, "Alice");
        assert_eq!(first[1].account_name, "Bob");
        assert_eq!(grouped[&2][0].emoji, "🎉");
    }
}
