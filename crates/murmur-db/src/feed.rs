//! Follower-scoped feed: one aggregate query over posts, their authors,
//! the viewer's follower edges and comment counts.

use rusqlite::{Connection, params_from_iter, types::Value};

use murmur_types::models::{FeedFilter, FeedItem};

use crate::StoreError;
use crate::codec::encode_time;
use crate::posts::{POST_COLUMNS, post_from_row};

pub(crate) fn query(
    conn: &Connection,
    user_id: i64,
    filter: &FeedFilter,
) -> Result<Vec<FeedItem>, StoreError> {
    let (sql, values) = build(user_id, filter);

    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params_from_iter(values), |row| {
            Ok(FeedItem {
                post: post_from_row(row)?,
                username: row.get(8)?,
                comments_count: row.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(items)
}

/// SQL text plus positional values. Only fixed fragments are spliced into the
/// text; every user-supplied value is bound.
fn build(user_id: i64, filter: &FeedFilter) -> (String, Vec<Value>) {
    let mut values = vec![Value::Integer(user_id)];
    let mut conditions = vec!["(p.user_id = ?1 OR f.follower_id IS NOT NULL)".to_string()];

    for tag in &filter.tags {
        values.push(Value::Text(tag.clone()));
        conditions.push(format!(
            "EXISTS (SELECT 1 FROM json_each(p.tags) WHERE json_each.value = ?{})",
            values.len()
        ));
    }

    if !filter.search.is_empty() {
        values.push(Value::Text(format!("%{}%", escape_like(&filter.search))));
        let n = values.len();
        conditions.push(format!(
            "(p.title LIKE ?{n} ESCAPE '\\' OR p.content LIKE ?{n} ESCAPE '\\')"
        ));
    }

    if let Some(since) = filter.since {
        values.push(Value::Text(encode_time(since)));
        conditions.push(format!("p.created_at >= ?{}", values.len()));
    }

    if let Some(until) = filter.until {
        values.push(Value::Text(encode_time(until)));
        conditions.push(format!("p.created_at <= ?{}", values.len()));
    }

    values.push(Value::Integer(i64::from(filter.limit)));
    let limit = values.len();
    values.push(Value::Integer(i64::from(filter.offset)));
    let offset = values.len();

    let order = filter.sort.as_sql();
    let sql = format!(
        "SELECT {POST_COLUMNS}, u.username, COUNT(c.id) AS comments_count
         FROM posts p
         JOIN users u ON u.id = p.user_id
         LEFT JOIN followers f ON f.user_id = p.user_id AND f.follower_id = ?1
         LEFT JOIN comments c ON c.post_id = p.id
         WHERE {}
         GROUP BY p.id
         ORDER BY p.created_at {order}, p.id {order}
         LIMIT ?{limit} OFFSET ?{offset}",
        conditions.join(" AND "),
    );

    (sql, values)
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
