use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};

// 分页大小上限
pub const MAX_PAGE_SIZE: i64 = 100;

/// 翻页游标，指向客户端已收到的最后一条记录
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub id: i64,
    pub created_at: DateTime<Utc>,
}

impl Cursor {
    // 解析失败视为没有游标，从第一页开始
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|s| serde_json::from_str(s).ok())
    }
}

/// 一页查询结果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Cursor>,
}

impl<T> Page<T> {
    /// 从 limit+1 条查询结果中截取一页。
    /// 多查出的那条记录只用来判断还有没有下一页，游标取自截断后的最后一条。
    pub fn from_rows<F>(mut rows: Vec<T>, limit: i64, cursor_of: F) -> Self
    where
        F: Fn(&T) -> Cursor,
    {
        if rows.len() as i64 > limit {
            rows.truncate(limit as usize);
            let next_cursor = rows.last().map(cursor_of);
            Page {
                items: rows,
                next_cursor,
            }
        } else {
            Page {
                items: rows,
                next_cursor: None,
            }
        }
    }
}

pub fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).min(MAX_PAGE_SIZE).max(1)
}

/// (created_at, id) 元组的字典序边界，时间戳相同的行按 id 截断。
/// 只比较 created_at 会在时间戳相同的行上漏掉或重复记录。
pub fn push_cursor_bound(qb: &mut QueryBuilder<'_, Postgres>, cursor: &Cursor) {
    qb.push(" AND (created_at < ")
        .push_bind(cursor.created_at)
        .push(" OR (created_at = ")
        .push_bind(cursor.created_at)
        .push(" AND id < ")
        .push_bind(cursor.id)
        .push("))");
}
