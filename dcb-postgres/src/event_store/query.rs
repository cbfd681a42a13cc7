//! Compiles a [`dcb_core::Query`] into a SQL predicate over `dcb_events`.
//!
//! Grounded on the teacher's `CriteriaBuilder<QE>`, which built a `WHERE`
//! fragment per `StreamQuery` filter tree; reshaped here around the
//! spec's flatter `Query = OR of QueryItem` shape and a single `tags
//! TEXT[]` column matched with Postgres array containment (`tags @>
//! $n::text[]`) instead of one column per domain identifier.
use dcb_core::{Cursor, Query, Tag};
use sqlx::postgres::PgArguments;
use sqlx::{Arguments, QueryBuilder};

/// Builds a parameterized `SELECT ... FROM dcb_events WHERE ...` statement
/// matching `query`, strictly after `after`, in position order.
pub fn build_select<'q>(query: &'q Query, after: Cursor) -> QueryBuilder<'q, sqlx::Postgres> {
    let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
        "SELECT position, transaction_id, event_type, tags, payload, occurred_at FROM dcb_events WHERE ",
    );
    push_predicate(&mut builder, query, after);
    builder.push(" ORDER BY position ASC");
    builder
}

/// Builds the same predicate as a `COUNT(*)` query, used by the
/// idempotency/consistency checks in `appendIf`. Both checks need more
/// than a yes/no answer: an idempotency hit reports how many events
/// matched (§4.3), so a `COUNT` is taken instead of an `EXISTS`.
pub fn build_count(query: &Query, after: Cursor) -> (String, PgArguments) {
    let mut sql = String::from("SELECT COUNT(*) FROM dcb_events WHERE ");
    let mut args = PgArguments::default();
    push_predicate_raw(&mut sql, &mut args, query, after);
    (sql, args)
}

fn push_predicate(builder: &mut QueryBuilder<sqlx::Postgres>, query: &Query, after: Cursor) {
    if query.is_empty() {
        builder.push("FALSE");
        return;
    }

    builder.push("position > ");
    builder.push_bind(after.position() as i64);
    builder.push(" AND (");
    for (i, item) in query.items().iter().enumerate() {
        if i > 0 {
            builder.push(" OR ");
        }
        builder.push("(");
        let mut needs_and = false;
        if let Some(types) = item.types() {
            builder.push("event_type = ANY(");
            builder.push_bind(types.to_vec());
            builder.push(")");
            needs_and = true;
        }
        if let Some(tags) = item.tag_set() {
            if needs_and {
                builder.push(" AND ");
            }
            let array = tag_array(tags);
            builder.push("tags @> ");
            builder.push_bind(array);
            builder.push("::text[]");
        }
        builder.push(")");
    }
    builder.push(")");
}

fn push_predicate_raw(sql: &mut String, args: &mut PgArguments, query: &Query, after: Cursor) {
    use std::fmt::Write;

    if query.is_empty() {
        sql.push_str("FALSE");
        return;
    }

    let mut n = 0;
    let mut next = || {
        n += 1;
        n
    };

    write!(sql, "position > ${}", next()).unwrap();
    args.add(after.position() as i64).expect("binding a bigint cursor position never fails");
    sql.push_str(" AND (");
    for (i, item) in query.items().iter().enumerate() {
        if i > 0 {
            sql.push_str(" OR ");
        }
        sql.push('(');
        let mut needs_and = false;
        if let Some(types) = item.types() {
            write!(sql, "event_type = ANY(${})", next()).unwrap();
            args.add(types.to_vec()).expect("binding a text[] type list never fails");
            needs_and = true;
        }
        if let Some(tags) = item.tag_set() {
            if needs_and {
                sql.push_str(" AND ");
            }
            write!(sql, "tags @> ${}::text[]", next()).unwrap();
            args.add(tag_array(tags)).expect("binding a text[] tag array never fails");
        }
        sql.push(')');
    }
    sql.push(')');
}

fn tag_array(tags: &dcb_core::TagSet) -> Vec<String> {
    tags.iter().map(Tag::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcb_core::{QueryItem, TagSet};

    #[test]
    fn empty_query_compiles_to_false() {
        let query = Query::none();
        let (sql, _) = build_count(&query, Cursor::ZERO);
        assert!(sql.contains("FALSE"));
    }

    #[test]
    fn item_with_types_and_tags_ands_them() {
        let mut tags = TagSet::new();
        tags.insert(dcb_core::Tag::new("wallet_id", "w1").unwrap());
        let item = QueryItem::new(Some(vec!["Deposited".to_string()]), Some(tags)).unwrap();
        let query = Query::single(item);
        let (sql, _) = build_count(&query, Cursor::ZERO);
        assert!(sql.contains("event_type = ANY"));
        assert!(sql.contains("tags @>"));
        assert!(sql.contains("AND"));
    }
}
