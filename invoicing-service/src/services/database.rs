//! Database service for invoicing-service.

use crate::calculator::{line_totals, ComputedTotals, LineItemDraft};
use crate::models::{
    Client, Company, CreateClient, CreateCompany, Invoice, InvoiceFields, InvoiceStatus,
    LineItem, ListInvoicesFilter, StatusSummary, UpdateClient, UpdateCompany,
};
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::NaiveDate;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const COMPANY_COLUMNS: &str = r#"
    c.id, c.name, c.email, c.phone, c.website, c.address, c.logo, c.pin_number,
    c.vat_registered, c.employee_count, c.created_at, c.updated_at, c.deleted_at,
    COALESCE((
        SELECT SUM(i.total) FROM invoices i
        WHERE i.company_id = c.id AND i.status <> 'cancelled'
    ), 0) AS total_billed
"#;

const CLIENT_COLUMNS: &str = r#"
    cl.id, cl.name, cl.email, cl.phone, cl.avatar, cl.pin_number, cl.vat_registered,
    cl.company_id, cl.created_at, cl.updated_at,
    COALESCE((
        SELECT SUM(i.total) FROM invoices i
        WHERE i.client_id = cl.id AND i.status <> 'cancelled'
    ), 0) AS total_billed,
    (
        SELECT COUNT(*) FROM invoices i
        WHERE i.client_id = cl.id AND i.status IN ('draft', 'sent', 'overdue')
    ) AS active_projects
"#;

const INVOICE_COLUMNS: &str = r#"
    id, invoice_number, client_id, company_id, issue_date, due_date, payment_date,
    currency, notes, status, status_updated_at, subtotal, discount_type, discount_value,
    discount_amount, total_before_tax, tax_rate, vat_applicable, withholding_applicable,
    vat_amount, withholding_tax_amount, total, template, created_at, updated_at
"#;

const LINE_ITEM_COLUMNS: &str = r#"
    id, invoice_id, position, description, quantity, rate, discount_type, discount_value,
    discount_amount, amount, vat_applicable, withholding_tax_applicable, created_at
"#;

fn map_invoice_write_error(e: sqlx::Error, invoice_number: &str, action: &str) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => AppError::Conflict(
            anyhow::anyhow!("Invoice number '{}' already exists", invoice_number),
        ),
        sqlx::Error::Database(ref db_err) if db_err.is_check_violation() => AppError::BadRequest(
            anyhow::anyhow!("Due date cannot be before issue date"),
        ),
        _ => AppError::DatabaseError(anyhow::anyhow!("Failed to {}: {}", action, e)),
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoicing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Wrap an existing pool, e.g. one created with `connect_lazy`.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, AppError> {
        self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })
    }

    // -------------------------------------------------------------------------
    // Company Operations
    // -------------------------------------------------------------------------

    /// Create a new company.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_company(&self, input: &CreateCompany) -> Result<Company, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_company"])
            .start_timer();

        let company_id = Uuid::new_v4();
        let company = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (
                id, name, email, phone, website, address, logo, pin_number,
                vat_registered, employee_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, name, email, phone, website, address, logo, pin_number,
                vat_registered, employee_count, created_at, updated_at, deleted_at,
                0::NUMERIC AS total_billed
            "#,
        )
        .bind(company_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.website)
        .bind(&input.address)
        .bind(&input.logo)
        .bind(&input.pin_number)
        .bind(input.vat_registered)
        .bind(input.employee_count)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create company: {}", e)))?;

        timer.observe_duration();

        info!(company_id = %company.id, "Company created");

        Ok(company)
    }

    /// Get a company by ID. Soft-deleted companies are not returned.
    #[instrument(skip(self), fields(company_id = %company_id))]
    pub async fn get_company(&self, company_id: Uuid) -> Result<Option<Company>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_company"])
            .start_timer();

        let company = sqlx::query_as::<_, Company>(&format!(
            "SELECT {} FROM companies c WHERE c.id = $1 AND c.deleted_at IS NULL",
            COMPANY_COLUMNS
        ))
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get company: {}", e)))?;

        timer.observe_duration();

        Ok(company)
    }

    /// Fetch companies by ID, including soft-deleted ones, for embedding.
    #[instrument(skip(self, company_ids), fields(count = company_ids.len()))]
    pub async fn get_companies_by_ids(&self, company_ids: &[Uuid]) -> Result<Vec<Company>, AppError> {
        if company_ids.is_empty() {
            return Ok(Vec::new());
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_companies_by_ids"])
            .start_timer();

        let companies = sqlx::query_as::<_, Company>(&format!(
            "SELECT {} FROM companies c WHERE c.id = ANY($1)",
            COMPANY_COLUMNS
        ))
        .bind(company_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get companies: {}", e)))?;

        timer.observe_duration();

        Ok(companies)
    }

    /// List active companies ordered by name.
    #[instrument(skip(self))]
    pub async fn list_companies(&self) -> Result<Vec<Company>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_companies"])
            .start_timer();

        let companies = sqlx::query_as::<_, Company>(&format!(
            "SELECT {} FROM companies c WHERE c.deleted_at IS NULL ORDER BY c.name",
            COMPANY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list companies: {}", e)))?;

        timer.observe_duration();

        Ok(companies)
    }

    /// Update a company.
    #[instrument(skip(self, input), fields(company_id = %company_id))]
    pub async fn update_company(
        &self,
        company_id: Uuid,
        input: &UpdateCompany,
    ) -> Result<Option<Company>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_company"])
            .start_timer();

        let updated = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE companies
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                website = COALESCE($5, website),
                address = COALESCE($6, address),
                logo = COALESCE($7, logo),
                pin_number = COALESCE($8, pin_number),
                vat_registered = COALESCE($9, vat_registered),
                employee_count = COALESCE($10, employee_count),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id
            "#,
        )
        .bind(company_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.website)
        .bind(&input.address)
        .bind(&input.logo)
        .bind(&input.pin_number)
        .bind(input.vat_registered)
        .bind(input.employee_count)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update company: {}", e)))?;

        timer.observe_duration();

        match updated {
            Some(id) => {
                info!(company_id = %id, "Company updated");
                self.get_company(id).await
            }
            None => Ok(None),
        }
    }

    /// Soft delete a company.
    #[instrument(skip(self), fields(company_id = %company_id))]
    pub async fn delete_company(&self, company_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_company"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE companies
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(company_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete company: {}", e)))?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(company_id = %company_id, "Company deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Client Operations
    // -------------------------------------------------------------------------

    /// Create a new client.
    #[instrument(skip(self, input), fields(company_id = %input.company_id))]
    pub async fn create_client(&self, input: &CreateClient) -> Result<Client, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_client"])
            .start_timer();

        let client_id = Uuid::new_v4();
        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (
                id, name, email, phone, avatar, pin_number, vat_registered, company_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, name, email, phone, avatar, pin_number, vat_registered, company_id,
                created_at, updated_at, 0::NUMERIC AS total_billed, 0::BIGINT AS active_projects
            "#,
        )
        .bind(client_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.avatar)
        .bind(&input.pin_number)
        .bind(input.vat_registered)
        .bind(input.company_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::BadRequest(anyhow::anyhow!("Company {} does not exist", input.company_id))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create client: {}", e)),
        })?;

        timer.observe_duration();

        info!(client_id = %client.id, "Client created");

        Ok(client)
    }

    /// Get a client by ID.
    #[instrument(skip(self), fields(client_id = %client_id))]
    pub async fn get_client(&self, client_id: Uuid) -> Result<Option<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {} FROM clients cl WHERE cl.id = $1",
            CLIENT_COLUMNS
        ))
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get client: {}", e)))?;

        timer.observe_duration();

        Ok(client)
    }

    /// Fetch clients by ID for embedding in invoice listings.
    #[instrument(skip(self, client_ids), fields(count = client_ids.len()))]
    pub async fn get_clients_by_ids(&self, client_ids: &[Uuid]) -> Result<Vec<Client>, AppError> {
        if client_ids.is_empty() {
            return Ok(Vec::new());
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_clients_by_ids"])
            .start_timer();

        let clients = sqlx::query_as::<_, Client>(&format!(
            "SELECT {} FROM clients cl WHERE cl.id = ANY($1)",
            CLIENT_COLUMNS
        ))
        .bind(client_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get clients: {}", e)))?;

        timer.observe_duration();

        Ok(clients)
    }

    /// List clients ordered by name, optionally restricted to one company.
    #[instrument(skip(self))]
    pub async fn list_clients(&self, company_id: Option<Uuid>) -> Result<Vec<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_clients"])
            .start_timer();

        let clients = sqlx::query_as::<_, Client>(&format!(
            r#"
            SELECT {} FROM clients cl
            WHERE ($1::uuid IS NULL OR cl.company_id = $1)
            ORDER BY cl.name
            "#,
            CLIENT_COLUMNS
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list clients: {}", e)))?;

        timer.observe_duration();

        Ok(clients)
    }

    /// Update a client.
    #[instrument(skip(self, input), fields(client_id = %client_id))]
    pub async fn update_client(
        &self,
        client_id: Uuid,
        input: &UpdateClient,
    ) -> Result<Option<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_client"])
            .start_timer();

        let updated = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE clients
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                avatar = COALESCE($5, avatar),
                pin_number = COALESCE($6, pin_number),
                vat_registered = COALESCE($7, vat_registered),
                company_id = COALESCE($8, company_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(client_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.avatar)
        .bind(&input.pin_number)
        .bind(input.vat_registered)
        .bind(input.company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::BadRequest(anyhow::anyhow!("Referenced company does not exist"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to update client: {}", e)),
        })?;

        timer.observe_duration();

        match updated {
            Some(id) => {
                info!(client_id = %id, "Client updated");
                self.get_client(id).await
            }
            None => Ok(None),
        }
    }

    /// Delete a client. Clients that still have invoices cannot be deleted.
    #[instrument(skip(self), fields(client_id = %client_id))]
    pub async fn delete_client(&self, client_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_client"])
            .start_timer();

        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(client_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    AppError::Conflict(anyhow::anyhow!("Client still has invoices"))
                }
                _ => AppError::DatabaseError(anyhow::anyhow!("Failed to delete client: {}", e)),
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(client_id = %client_id, "Client deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Highest numeric suffix among invoice numbers starting with `prefix`
    /// (e.g. `INV-2024-`), or 0 when there are none. Suffixes that are not
    /// plain digits are ignored.
    #[instrument(skip(self))]
    pub async fn max_invoice_sequence(&self, prefix: &str) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["max_invoice_sequence"])
            .start_timer();

        let sequence = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(MAX(
                CASE WHEN substring(invoice_number FROM char_length($1) + 1) ~ '^[0-9]{1,18}$'
                     THEN CAST(substring(invoice_number FROM char_length($1) + 1) AS BIGINT)
                END
            ), 0)
            FROM invoices
            WHERE left(invoice_number, char_length($1)) = $1
            "#,
        )
        .bind(prefix)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to read invoice sequence: {}", e))
        })?;

        timer.observe_duration();

        Ok(sequence)
    }

    /// Create a draft invoice and its line items in one transaction.
    #[instrument(skip(self, fields, totals, items), fields(invoice_number = %fields.invoice_number, line_items = items.len()))]
    pub async fn create_invoice(
        &self,
        fields: &InvoiceFields,
        totals: &ComputedTotals,
        items: &[LineItemDraft],
    ) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self.begin().await?;

        let invoice_id = Uuid::new_v4();
        let discount = fields.modifiers.discount;
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (
                id, invoice_number, client_id, company_id, issue_date, due_date, currency, notes,
                status, status_updated_at, subtotal, discount_type, discount_value, discount_amount,
                total_before_tax, tax_rate, vat_applicable, withholding_applicable, vat_amount,
                withholding_tax_amount, total, template
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'draft', NOW(), $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20)
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .bind(&fields.invoice_number)
        .bind(fields.client_id)
        .bind(fields.company_id)
        .bind(fields.issue_date)
        .bind(fields.due_date)
        .bind(fields.currency.as_str())
        .bind(&fields.notes)
        .bind(totals.subtotal)
        .bind(discount.kind())
        .bind(discount.value())
        .bind(totals.discount_amount)
        .bind(totals.total_before_tax())
        .bind(fields.modifiers.tax_rate)
        .bind(fields.modifiers.vat_applicable)
        .bind(fields.modifiers.withholding_applicable)
        .bind(totals.tax_amount)
        .bind(totals.withholding_amount)
        .bind(totals.total)
        .bind(&fields.template)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_invoice_write_error(e, &fields.invoice_number, "create invoice"))?;

        insert_line_items(&mut tx, invoice.id, items).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit invoice: {}", e))
        })?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            total = %invoice.total,
            "Draft invoice created"
        );

        Ok(invoice)
    }

    /// Get an invoice by ID.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE id = $1",
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// Get line items for an invoice in display order.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_line_items(&self, invoice_id: Uuid) -> Result<Vec<LineItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_line_items"])
            .start_timer();

        let line_items = sqlx::query_as::<_, LineItem>(&format!(
            "SELECT {} FROM line_items WHERE invoice_id = $1 ORDER BY position",
            LINE_ITEM_COLUMNS
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e)))?;

        timer.observe_duration();

        Ok(line_items)
    }

    /// List invoices, newest first.
    ///
    /// The status filter matches the status a reader would see: sent invoices
    /// past their due date match `overdue`, not `sent`.
    #[instrument(skip(self, filter), fields(status = ?filter.status))]
    pub async fn list_invoices(
        &self,
        filter: &ListInvoicesFilter,
        today: NaiveDate,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100);
        let offset = filter.offset.max(0);
        let status = filter.status.map(|s| s.as_str());

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {} FROM invoices
            WHERE ($1::text IS NULL
                   OR (CASE WHEN status = 'sent' AND due_date < $2 THEN 'overdue' ELSE status END) = $1)
              AND ($3::uuid IS NULL OR client_id = $3)
              AND ($4::uuid IS NULL OR company_id = $4)
            ORDER BY created_at DESC, id
            LIMIT $5 OFFSET $6
            "#,
            INVOICE_COLUMNS
        ))
        .bind(status)
        .bind(today)
        .bind(filter.client_id)
        .bind(filter.company_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Update a draft invoice, optionally replacing all of its line items.
    #[instrument(skip(self, fields, totals, items), fields(invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        invoice_id: Uuid,
        fields: &InvoiceFields,
        totals: &ComputedTotals,
        items: Option<&[LineItemDraft]>,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let mut tx = self.begin().await?;

        let status = lock_invoice_status(&mut tx, invoice_id).await?;
        match status.as_deref() {
            Some("draft") => {}
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Only draft invoices can be updated"
                )))
            }
            None => return Ok(None),
        }

        let discount = fields.modifiers.discount;
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET invoice_number = $2,
                client_id = $3,
                company_id = $4,
                issue_date = $5,
                due_date = $6,
                currency = $7,
                notes = $8,
                subtotal = $9,
                discount_type = $10,
                discount_value = $11,
                discount_amount = $12,
                total_before_tax = $13,
                tax_rate = $14,
                vat_applicable = $15,
                withholding_applicable = $16,
                vat_amount = $17,
                withholding_tax_amount = $18,
                total = $19,
                template = $20,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .bind(&fields.invoice_number)
        .bind(fields.client_id)
        .bind(fields.company_id)
        .bind(fields.issue_date)
        .bind(fields.due_date)
        .bind(fields.currency.as_str())
        .bind(&fields.notes)
        .bind(totals.subtotal)
        .bind(discount.kind())
        .bind(discount.value())
        .bind(totals.discount_amount)
        .bind(totals.total_before_tax())
        .bind(fields.modifiers.tax_rate)
        .bind(fields.modifiers.vat_applicable)
        .bind(fields.modifiers.withholding_applicable)
        .bind(totals.tax_amount)
        .bind(totals.withholding_amount)
        .bind(totals.total)
        .bind(&fields.template)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_invoice_write_error(e, &fields.invoice_number, "update invoice"))?;

        if let Some(items) = items {
            sqlx::query("DELETE FROM line_items WHERE invoice_id = $1")
                .bind(invoice_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to replace line items: {}", e))
                })?;
            insert_line_items(&mut tx, invoice_id, items).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit invoice update: {}", e))
        })?;

        timer.observe_duration();

        info!(invoice_id = %invoice.id, total = %invoice.total, "Invoice updated");

        Ok(Some(invoice))
    }

    /// Move an invoice to a new status. Paid invoices record their payment date.
    #[instrument(skip(self), fields(invoice_id = %invoice_id, status = next.as_str()))]
    pub async fn update_invoice_status(
        &self,
        invoice_id: Uuid,
        next: InvoiceStatus,
        payment_date: NaiveDate,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice_status"])
            .start_timer();

        let mut tx = self.begin().await?;

        let current = match lock_invoice_status(&mut tx, invoice_id).await? {
            Some(status) => InvoiceStatus::from_string(&status),
            None => return Ok(None),
        };

        if !current.can_transition_to(next) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Cannot change invoice status from {} to {}",
                current.as_str(),
                next.as_str()
            )));
        }

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET status = $2,
                status_updated_at = NOW(),
                payment_date = CASE WHEN $2 = 'paid' THEN $3 ELSE payment_date END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .bind(next.as_str())
        .bind(payment_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice status: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit status change: {}", e))
        })?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice.id,
            from = current.as_str(),
            to = next.as_str(),
            "Invoice status changed"
        );

        Ok(Some(invoice))
    }

    /// Delete an invoice. Line items go with it.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, invoice_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(invoice_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e)))?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(invoice_id = %invoice_id, "Invoice deleted");
        }

        Ok(deleted)
    }

    /// Count and total per status, with past-due sent invoices grouped as overdue.
    #[instrument(skip(self))]
    pub async fn status_summary(&self, today: NaiveDate) -> Result<Vec<StatusSummary>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["status_summary"])
            .start_timer();

        let summary = sqlx::query_as::<_, StatusSummary>(
            r#"
            SELECT
                CASE WHEN status = 'sent' AND due_date < $1 THEN 'overdue' ELSE status END AS status,
                COUNT(*) AS count,
                COALESCE(SUM(total), 0) AS total
            FROM invoices
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to summarise invoices: {}", e))
        })?;

        timer.observe_duration();

        Ok(summary)
    }
}

async fn lock_invoice_status(
    tx: &mut Transaction<'static, Postgres>,
    invoice_id: Uuid,
) -> Result<Option<String>, AppError> {
    sqlx::query_scalar::<_, String>("SELECT status FROM invoices WHERE id = $1 FOR UPDATE")
        .bind(invoice_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock invoice: {}", e)))
}

async fn insert_line_items(
    tx: &mut Transaction<'static, Postgres>,
    invoice_id: Uuid,
    items: &[LineItemDraft],
) -> Result<(), AppError> {
    for (position, item) in items.iter().enumerate() {
        let totals = line_totals(item);
        sqlx::query(
            r#"
            INSERT INTO line_items (
                id, invoice_id, position, description, quantity, rate, discount_type,
                discount_value, discount_amount, amount, vat_applicable, withholding_tax_applicable
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(position as i32)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.rate)
        .bind(item.discount.kind())
        .bind(item.discount.value())
        .bind(totals.discount_amount)
        .bind(totals.amount)
        .bind(item.vat_applicable)
        .bind(item.withholding_tax_applicable)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to add line item: {}", e)))?;
    }
    Ok(())
}
