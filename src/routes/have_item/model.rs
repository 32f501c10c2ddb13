use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::pagination::{self, Cursor, Page};

// 分享物品列表默认页大小
const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HaveItem {
    pub id: i64,
    pub group_id: String,
    pub name: String,
    pub description: Option<String>,
    pub quality: String,
    pub found_by: String,
    pub is_reserved: bool,
    pub reserved_by: Option<String>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

const HAVE_ITEM_COLUMNS: &str = "id, group_id, name, description, quality, found_by, \
     is_reserved, reserved_by, reserved_at, is_active, created_at";

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HaveItemCounts {
    pub all_count: i64,
    pub my_items_count: i64,
    pub requests_count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHaveItemRequest {
    pub group_id: String,
    pub name: String,
    pub description: Option<String>,
    pub quality: String,
    pub found_by: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemActionRequest {
    pub item_id: i64,
    pub account_name: String,
}

/// 列表查询识别的过滤条件，缺省的条件不会出现在语句里
#[derive(Debug, Default)]
pub struct HaveItemFilter {
    pub account_name: Option<String>,
    pub tab: Option<String>,
    pub search: Option<String>,
    pub qualities: Vec<String>,
    pub reservable: Option<bool>,
    pub cursor: Option<Cursor>,
}

// 过滤子句按固定顺序拼接：范围、tab、搜索、品质、可预定、游标边界
fn build_list_query(group_id: &str, filter: &HaveItemFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {} FROM have_items WHERE group_id = ",
        HAVE_ITEM_COLUMNS
    ));
    qb.push_bind(group_id.to_string());
    qb.push(" AND is_active = TRUE");

    // tab 和可预定过滤都需要调用方账号名，没有就跳过
    if let Some(account_name) = &filter.account_name {
        match filter.tab.as_deref() {
            Some("mine") => {
                qb.push(" AND found_by = ").push_bind(account_name.clone());
            }
            Some("requests") => {
                qb.push(" AND found_by = ")
                    .push_bind(account_name.clone())
                    .push(" AND is_reserved = TRUE");
            }
            _ => {}
        }
    }

    if let Some(search) = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
    {
        let pattern = format!("%{}%", search);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if !filter.qualities.is_empty() {
        qb.push(" AND quality = ANY(")
            .push_bind(filter.qualities.clone())
            .push(")");
    }

    if let (Some(reservable), Some(account_name)) = (filter.reservable, &filter.account_name) {
        qb.push(" AND is_reserved = ")
            .push_bind(!reservable)
            .push(" AND found_by != ")
            .push_bind(account_name.clone());
    }

    if let Some(cursor) = &filter.cursor {
        pagination::push_cursor_bound(&mut qb, cursor);
    }

    qb
}

impl HaveItem {
    pub async fn list(
        pool: &PgPool,
        group_id: &str,
        filter: &HaveItemFilter,
        limit: Option<i64>,
    ) -> Result<Page<HaveItem>, sqlx::Error> {
        let limit = pagination::clamp_limit(limit, DEFAULT_PAGE_SIZE);

        let mut qb = build_list_query(group_id, filter);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit + 1);

        let rows: Vec<HaveItem> = qb.build_query_as().fetch_all(pool).await?;

        Ok(Page::from_rows(rows, limit, |item| Cursor {
            id: item.id,
            created_at: item.created_at,
        }))
    }

    pub async fn counts(
        pool: &PgPool,
        group_id: &str,
        account_name: &str,
    ) -> Result<HaveItemCounts, sqlx::Error> {
        // 同一遍扫描里做三个条件计数
        sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS all_count,
                COUNT(*) FILTER (WHERE found_by = $2) AS my_items_count,
                COUNT(*) FILTER (WHERE found_by = $2 AND is_reserved) AS requests_count
            FROM have_items
            WHERE group_id = $1 AND is_active = TRUE
            "#,
        )
        .bind(group_id)
        .bind(account_name)
        .fetch_one(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        req: CreateHaveItemRequest,
    ) -> Result<HaveItem, sqlx::Error> {
        sqlx::query_as(&format!(
            r#"
            INSERT INTO have_items (group_id, name, description, quality, found_by, is_reserved, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, FALSE, TRUE, NOW())
            RETURNING {}
            "#,
            HAVE_ITEM_COLUMNS
        ))
        .bind(&req.group_id)
        .bind(&req.name)
        .bind(&req.description)
        .bind(&req.quality)
        .bind(&req.found_by)
        .fetch_one(pool)
        .await
    }

    pub async fn reserve(
        pool: &PgPool,
        item_id: i64,
        account_name: &str,
    ) -> Result<HaveItem, sqlx::Error> {
        let found_by: String =
            sqlx::query_scalar("SELECT found_by FROM have_items WHERE id = $1 AND is_active = TRUE")
                .bind(item_id)
                .fetch_optional(pool)
                .await?
                .ok_or(sqlx::Error::RowNotFound)?;

        if found_by == account_name {
            return Err(sqlx::Error::Protocol(
                "Cannot reserve your own item".into(),
            ));
        }

        // 最后写入者生效，同时预定的冲突由群成员自行协调
        sqlx::query_as(&format!(
            r#"
            UPDATE have_items
            SET is_reserved = TRUE, reserved_by = $2, reserved_at = NOW()
            WHERE id = $1 AND is_active = TRUE
            RETURNING {}
            "#,
            HAVE_ITEM_COLUMNS
        ))
        .bind(item_id)
        .bind(account_name)
        .fetch_one(pool)
        .await
    }

    pub async fn release(
        pool: &PgPool,
        item_id: i64,
        account_name: &str,
    ) -> Result<HaveItem, sqlx::Error> {
        let row: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT found_by, reserved_by FROM have_items WHERE id = $1")
                .bind(item_id)
                .fetch_optional(pool)
                .await?;

        let (found_by, reserved_by) = row.ok_or(sqlx::Error::RowNotFound)?;
        if found_by != account_name && reserved_by.as_deref() != Some(account_name) {
            return Err(sqlx::Error::Protocol(
                "Only the finder or the reserver can release a reservation".into(),
            ));
        }

        sqlx::query_as(&format!(
            r#"
            UPDATE have_items
            SET is_reserved = FALSE, reserved_by = NULL, reserved_at = NULL
            WHERE id = $1
            RETURNING {}
            "#,
            HAVE_ITEM_COLUMNS
        ))
        .bind(item_id)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(
        pool: &PgPool,
        item_id: i64,
        account_name: &str,
    ) -> Result<(), sqlx::Error> {
        let found_by: String = sqlx::query_scalar("SELECT found_by FROM have_items WHERE id = $1")
            .bind(item_id)
            .fetch_optional(pool)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        if found_by != account_name {
            return Err(sqlx::Error::Protocol(
                "Only the finder can delete an item".into(),
            ));
        }

        sqlx::query("DELETE FROM have_items WHERE id = $1")
            .bind(item_id)
            .execute(pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_sql() -> String {
        format!(
            "SELECT {} FROM have_items WHERE group_id = $1 AND is_active = TRUE",
            HAVE_ITEM_COLUMNS
        )
    }

    #[test]
    fn bare_filter_only_scopes_group_and_active() {
        let qb = build_list_query("G", &HaveItemFilter::default());
        assert_eq!(qb.sql(), base_sql());
    }

    #[test]
    fn tab_mine_filters_by_owner() {
        let filter = HaveItemFilter {
            account_name: Some("Bob".into()),
            tab: Some("mine".into()),
            ..Default::default()
        };
        let qb = build_list_query("G", &filter);
        assert_eq!(qb.sql(), format!("{} AND found_by = $2", base_sql()));
    }

    #[test]
    fn tab_requests_filters_owner_and_reserved() {
        let filter = HaveItemFilter {
            account_name: Some("Bob".into()),
            tab: Some("requests".into()),
            ..Default::default()
        };
        let qb = build_list_query("G", &filter);
        assert_eq!(
            qb.sql(),
            format!("{} AND found_by = $2 AND is_reserved = TRUE", base_sql())
        );
    }

    #[test]
    fn tab_without_account_is_ignored() {
        let filter = HaveItemFilter {
            tab: Some("mine".into()),
            ..Default::default()
        };
        let qb = build_list_query("G", &filter);
        assert_eq!(qb.sql(), base_sql());
    }

    #[test]
    fn unknown_tab_behaves_as_all() {
        let filter = HaveItemFilter {
            account_name: Some("Bob".into()),
            tab: Some("everything".into()),
            ..Default::default()
        };
        let qb = build_list_query("G", &filter);
        assert_eq!(qb.sql(), base_sql());
    }

    #[test]
    fn search_matches_name_or_description() {
        let filter = HaveItemFilter {
            search: Some("ring".into()),
            ..Default::default()
        };
        let qb = build_list_query("G", &filter);
        assert_eq!(
            qb.sql(),
            format!(
                "{} AND (name ILIKE $2 OR description ILIKE $3)",
                base_sql()
            )
        );
    }

    #[test]
    fn blank_search_is_ignored() {
        let filter = HaveItemFilter {
            search: Some("   ".into()),
            ..Default::default()
        };
        let qb = build_list_query("G", &filter);
        assert_eq!(qb.sql(), base_sql());
    }

    #[test]
    fn empty_qualities_list_adds_no_clause() {
        let filter = HaveItemFilter {
            qualities: Vec::new(),
            ..Default::default()
        };
        let qb = build_list_query("G", &filter);
        assert_eq!(qb.sql(), base_sql());
    }

    #[test]
    fn qualities_use_membership_test() {
        let filter = HaveItemFilter {
            qualities: vec!["Rare".into(), "Epic".into()],
            ..Default::default()
        };
        let qb = build_list_query("G", &filter);
        assert_eq!(qb.sql(), format!("{} AND quality = ANY($2)", base_sql()));
    }

    #[test]
    fn reservable_excludes_own_items() {
        let filter = HaveItemFilter {
            account_name: Some("Bob".into()),
            reservable: Some(true),
            ..Default::default()
        };
        let qb = build_list_query("G", &filter);
        assert_eq!(
            qb.sql(),
            format!("{} AND is_reserved = $2 AND found_by != $3", base_sql())
        );
    }

    #[test]
    fn reservable_without_account_is_ignored() {
        let filter = HaveItemFilter {
            reservable: Some(true),
            ..Default::default()
        };
        let qb = build_list_query("G", &filter);
        assert_eq!(qb.sql(), base_sql());
    }

    #[test]
    fn all_filters_compose_in_fixed_order() {
        let filter = HaveItemFilter {
            account_name: Some("Bob".into()),
            tab: Some("mine".into()),
            search: Some("ring".into()),
            qualities: vec!["Rare".into()],
            reservable: Some(false),
            cursor: Some(Cursor {
                id: 31,
                created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            }),
        };
        let qb = build_list_query("G", &filter);
        assert_eq!(
            qb.sql(),
            format!(
                "{} AND found_by = $2 \
                 AND (name ILIKE $3 OR description ILIKE $4) \
                 AND quality = ANY($5) \
                 AND is_reserved = $6 AND found_by != $7 \
                 AND (created_at < $8 OR (created_at = $9 AND id < $10))",
                base_sql()
            )
        );
    }
}
