/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// All statements use `IF NOT EXISTS` so they are safe to re-run on every
/// startup.
///
/// `memory_limit` comes from `Config.duckdb_memory_limit`
/// (env `BRIKLYST_DUCKDB_MEMORY`, default `"1GB"`).
///
/// DuckDB does not cascade deletes. Child rows (collection membership) are
/// removed explicitly inside the same transaction as their parent; see
/// `delete_product()` and `delete_collection()`.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- SETTINGS
-- ===========================================
-- Keys stored in this table:
--   'jwt_secret'  – HS256 signing secret for session tokens
--   'version'     – database schema version
CREATE TABLE IF NOT EXISTS settings (
    key             VARCHAR PRIMARY KEY,
    value           VARCHAR NOT NULL
);

-- ===========================================
-- USERS (tenants)
-- ===========================================
CREATE TABLE IF NOT EXISTS users (
    id              VARCHAR PRIMARY KEY,           -- 'usr_' + 10 chars
    email           VARCHAR NOT NULL UNIQUE,       -- stored lowercased
    name            VARCHAR NOT NULL,
    password_hash   VARCHAR NOT NULL,              -- argon2id PHC string
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS login_attempts (
    id              VARCHAR PRIMARY KEY,
    email           VARCHAR NOT NULL,
    attempted_at    TIMESTAMP NOT NULL,
    succeeded       BOOLEAN NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_login_attempts_email
    ON login_attempts(email, attempted_at);

-- ===========================================
-- TEMPLATES (built-in, seeded at open)
-- ===========================================
CREATE TABLE IF NOT EXISTS templates (
    id              VARCHAR PRIMARY KEY,
    name            VARCHAR NOT NULL,
    description     VARCHAR NOT NULL,
    theme           VARCHAR NOT NULL,              -- JSON Theme
    sections        VARCHAR NOT NULL,              -- JSON [Section]
    position        BIGINT NOT NULL DEFAULT 0
);

-- ===========================================
-- STOREFRONTS (one per user)
-- ===========================================
CREATE TABLE IF NOT EXISTS storefronts (
    id              VARCHAR PRIMARY KEY,           -- 'sf_' + 10 chars
    user_id         VARCHAR NOT NULL UNIQUE,
    slug            VARCHAR NOT NULL UNIQUE,
    title           VARCHAR NOT NULL,
    bio             VARCHAR,
    avatar_url      VARCHAR,
    theme           VARCHAR NOT NULL,              -- JSON Theme
    sections        VARCHAR NOT NULL,              -- JSON [Section]
    template_id     VARCHAR,
    published       BOOLEAN NOT NULL DEFAULT true,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- ===========================================
-- PRODUCTS
-- ===========================================
CREATE TABLE IF NOT EXISTS products (
    id              VARCHAR PRIMARY KEY,           -- 'prd_' + 10 chars
    storefront_id   VARCHAR NOT NULL,
    title           VARCHAR NOT NULL,
    description     VARCHAR,
    price           VARCHAR,                       -- display text, e.g. '$19.99'
    image_url       VARCHAR,
    affiliate_url   VARCHAR NOT NULL,
    position        BIGINT NOT NULL DEFAULT 0,
    is_active       BOOLEAN NOT NULL DEFAULT true,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_products_storefront ON products(storefront_id);

-- ===========================================
-- COLLECTIONS
-- ===========================================
CREATE TABLE IF NOT EXISTS collections (
    id              VARCHAR PRIMARY KEY,           -- 'col_' + 10 chars
    storefront_id   VARCHAR NOT NULL,
    title           VARCHAR NOT NULL,
    description     VARCHAR,
    position        BIGINT NOT NULL DEFAULT 0,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_collections_storefront ON collections(storefront_id);

CREATE TABLE IF NOT EXISTS collection_products (
    collection_id   VARCHAR NOT NULL,
    product_id      VARCHAR NOT NULL,
    position        BIGINT NOT NULL DEFAULT 0,
    PRIMARY KEY (collection_id, product_id)
);

-- ===========================================
-- CLICKS (immutable, retained indefinitely)
-- ===========================================
CREATE TABLE IF NOT EXISTS clicks (
    id              VARCHAR PRIMARY KEY,           -- UUID v4
    product_id      VARCHAR NOT NULL,
    storefront_id   VARCHAR NOT NULL,
    campaign_id     VARCHAR,                       -- set when the click came from a campaign email
    visitor_hash    VARCHAR NOT NULL,              -- sha256(day_epoch + ip + ua)[0:8] hex
    referrer_domain VARCHAR,
    created_at      TIMESTAMP NOT NULL             -- UTC
);
-- Primary query pattern: storefront + date range
CREATE INDEX IF NOT EXISTS idx_clicks_storefront_time
    ON clicks(storefront_id, created_at);
CREATE INDEX IF NOT EXISTS idx_clicks_campaign
    ON clicks(campaign_id);

-- ===========================================
-- EMAIL CAMPAIGNS AND SUBSCRIBERS
-- ===========================================
CREATE TABLE IF NOT EXISTS campaigns (
    id              VARCHAR PRIMARY KEY,           -- 'cmp_' + 10 chars
    storefront_id   VARCHAR NOT NULL,
    subject         VARCHAR NOT NULL,
    body            VARCHAR NOT NULL,
    status          VARCHAR NOT NULL DEFAULT 'draft',  -- 'draft' | 'sent'
    recipients      BIGINT NOT NULL DEFAULT 0,
    sent_at         TIMESTAMP,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_campaigns_storefront ON campaigns(storefront_id);

CREATE TABLE IF NOT EXISTS subscribers (
    id              VARCHAR PRIMARY KEY,           -- 'sub_' + 10 chars
    storefront_id   VARCHAR NOT NULL,
    email           VARCHAR NOT NULL,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (storefront_id, email)
);
"#
    )
}
