use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager, ManagerConfig},
    AsyncPgConnection, RunQueryDsl,
};
use uuid::Uuid;

use crate::models::{
    AnalyticsRow, AnalyticsUpsert, EmailRow, NewEmailRow, NewResponseRow, ResponseRow,
};

pub type DbPool = Pool<AsyncPgConnection>;

async fn establish_tls_connection(config: String) -> diesel::ConnectionResult<AsyncPgConnection> {
    // Set up rustls TLS configuration
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

    let (client, connection) = tokio_postgres::connect(&config, tls)
        .await
        .map_err(|e| diesel::ConnectionError::BadConnection(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    AsyncPgConnection::try_from(client).await
}

pub fn establish_connection_pool(database_url: &str) -> anyhow::Result<DbPool> {
    let mut manager_config = ManagerConfig::default();
    manager_config.custom_setup =
        Box::new(|url| Box::pin(establish_tls_connection(url.to_string())));

    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_config(
        database_url,
        manager_config,
    );
    let pool = Pool::builder(config).build()?;

    Ok(pool)
}

// Email database operations
pub mod emails {
    use super::*;
    use diesel::dsl::sql;
    use diesel::sql_types::Integer;
    use shared_types::{EmailFilter, EmailStatus, Priority};

    pub async fn find_by_message_id(
        conn: &mut AsyncPgConnection,
        msg_id: &str,
    ) -> QueryResult<Option<EmailRow>> {
        use crate::schema::emails::dsl::*;

        emails
            .filter(message_id.eq(msg_id))
            .select(EmailRow::as_select())
            .first(conn)
            .await
            .optional()
    }

    /// Insert a new email. ON CONFLICT DO NOTHING on `message_id` turns a
    /// duplicate into `None`.
    pub async fn insert(
        conn: &mut AsyncPgConnection,
        new_email: NewEmailRow,
    ) -> QueryResult<Option<EmailRow>> {
        use crate::schema::emails::dsl::*;

        diesel::insert_into(emails)
            .values(&new_email)
            .on_conflict(message_id)
            .do_nothing()
            .returning(EmailRow::as_returning())
            .get_result(conn)
            .await
            .optional()
    }

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        email_id: Uuid,
    ) -> QueryResult<Option<EmailRow>> {
        use crate::schema::emails::dsl::*;

        emails
            .filter(id.eq(email_id))
            .select(EmailRow::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn update(
        conn: &mut AsyncPgConnection,
        email_id: Uuid,
        status_val: Option<EmailStatus>,
        priority_val: Option<Priority>,
    ) -> QueryResult<Option<EmailRow>> {
        use crate::schema::emails::dsl::*;

        if let Some(s) = status_val {
            diesel::update(emails.filter(id.eq(email_id)))
                .set(status.eq(s.as_str()))
                .execute(conn)
                .await?;
        }
        if let Some(p) = priority_val {
            diesel::update(emails.filter(id.eq(email_id)))
                .set(priority.eq(p.as_str()))
                .execute(conn)
                .await?;
        }

        get_by_id(conn, email_id).await
    }

    /// Filtered page of emails, urgent first then newest first
    pub async fn list(
        conn: &mut AsyncPgConnection,
        filter: &EmailFilter,
    ) -> QueryResult<Vec<EmailRow>> {
        use crate::schema::emails::dsl::*;

        let mut query = emails.select(EmailRow::as_select()).into_boxed();

        if let Some(s) = filter.status {
            query = query.filter(status.eq(s.as_str().to_string()));
        }
        if let Some(p) = filter.priority {
            query = query.filter(priority.eq(p.as_str().to_string()));
        }
        if let Some(s) = filter.sentiment {
            query = query.filter(sentiment.eq(s.as_str().to_string()));
        }
        if let Some(term) = filter.search_term() {
            let pattern = format!("%{}%", term);
            query = query.filter(
                subject
                    .ilike(pattern.clone())
                    .or(sender.ilike(pattern.clone()))
                    .or(body.ilike(pattern)),
            );
        }

        query
            .order_by(sql::<Integer>(
                "CASE priority WHEN 'urgent' THEN 0 WHEN 'normal' THEN 1 ELSE 2 END",
            ))
            .then_order_by(received_at.desc())
            .limit(filter.page_limit())
            .offset(filter.page_offset())
            .load(conn)
            .await
    }

    pub async fn list_received_between(
        conn: &mut AsyncPgConnection,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> QueryResult<Vec<EmailRow>> {
        use crate::schema::emails::dsl::*;

        emails
            .filter(received_at.ge(start))
            .filter(received_at.lt(end))
            .order_by(received_at.asc())
            .select(EmailRow::as_select())
            .load(conn)
            .await
    }
}

// Response database operations
pub mod responses {
    use super::*;

    pub async fn insert(
        conn: &mut AsyncPgConnection,
        new_response: NewResponseRow,
    ) -> QueryResult<ResponseRow> {
        use crate::schema::responses::dsl::*;

        diesel::insert_into(responses)
            .values(&new_response)
            .returning(ResponseRow::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn update(
        conn: &mut AsyncPgConnection,
        response_id: Uuid,
        content_val: Option<&str>,
        sent_at_val: Option<DateTime<Utc>>,
    ) -> QueryResult<Option<ResponseRow>> {
        use crate::schema::responses::dsl::*;

        if let Some(c) = content_val {
            diesel::update(responses.filter(id.eq(response_id)))
                .set(content.eq(c))
                .execute(conn)
                .await?;
        }
        if let Some(ts) = sent_at_val {
            diesel::update(responses.filter(id.eq(response_id)))
                .set(sent_at.eq(Some(ts)))
                .execute(conn)
                .await?;
        }

        // Always bump updated_at and return the result
        diesel::update(responses.filter(id.eq(response_id)))
            .set(updated_at.eq(Utc::now()))
            .returning(ResponseRow::as_returning())
            .get_result(conn)
            .await
            .optional()
    }

    pub async fn list_for_email(
        conn: &mut AsyncPgConnection,
        owner_id: Uuid,
    ) -> QueryResult<Vec<ResponseRow>> {
        use crate::schema::responses::dsl::*;

        responses
            .filter(email_id.eq(owner_id))
            .order_by(created_at.asc())
            .select(ResponseRow::as_select())
            .load(conn)
            .await
    }
}

// Daily analytics operations
pub mod analytics {
    use super::*;

    /// Insert or overwrite the snapshot for `row.date`
    pub async fn upsert(
        conn: &mut AsyncPgConnection,
        row: AnalyticsUpsert,
    ) -> QueryResult<AnalyticsRow> {
        use crate::schema::email_analytics::dsl::*;

        diesel::insert_into(email_analytics)
            .values(&row)
            .on_conflict(date)
            .do_update()
            .set(&row)
            .returning(AnalyticsRow::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn list_between(
        conn: &mut AsyncPgConnection,
        from: NaiveDate,
        to: NaiveDate,
    ) -> QueryResult<Vec<AnalyticsRow>> {
        use crate::schema::email_analytics::dsl::*;

        email_analytics
            .filter(date.ge(from))
            .filter(date.le(to))
            .order_by(date.asc())
            .select(AnalyticsRow::as_select())
            .load(conn)
            .await
    }
}
