use sqlx::PgPool;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id          UUID PRIMARY KEY,
        email       TEXT NOT NULL UNIQUE,
        first_name  TEXT,
        last_name   TEXT,
        role        TEXT NOT NULL DEFAULT 'member' CHECK (role IN ('admin', 'member')),
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS projects (
        id          UUID PRIMARY KEY,
        name        TEXT NOT NULL,
        description TEXT,
        creator_id  UUID NOT NULL REFERENCES users(id) ON DELETE RESTRICT,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS project_members (
        project_id  UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        user_id     UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        PRIMARY KEY (project_id, user_id)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_project_members_user
    ON project_members (user_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id          UUID PRIMARY KEY,
        project_id  UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        title       TEXT NOT NULL,
        description TEXT,
        status      TEXT NOT NULL DEFAULT 'todo'
                    CHECK (status IN ('todo', 'in_progress', 'done')),
        assignee_id UUID REFERENCES users(id) ON DELETE SET NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_tasks_project
    ON tasks (project_id, created_at DESC)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_tasks_assignee
    ON tasks (assignee_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id          UUID PRIMARY KEY,
        task_id     UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
        author_id   UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        content     TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_comments_task
    ON comments (task_id, created_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS api_keys (
        id          UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        user_id     UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        key_id      TEXT NOT NULL UNIQUE,
        key_hash    TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        revoked_at  TIMESTAMPTZ
    )
    "#,
];

/// Creates every table the server needs. Safe to run repeatedly.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
