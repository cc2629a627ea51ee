//! Table creation at startup.
//!
//! Statements are idempotent and run in dependency order. A failing
//! statement is logged and the remaining ones still run; the server starts
//! either way.

use sqlx::PgPool;
use tracing::{error, info};

/// Ordered `(name, statement)` pairs.
pub const SCHEMA_STATEMENTS: &[(&str, &str)] = &[
    (
        "medicos",
        r#"
        CREATE TABLE IF NOT EXISTS medicos (
            id SERIAL PRIMARY KEY,
            nombre VARCHAR(255) NOT NULL,
            email VARCHAR(255) UNIQUE NOT NULL,
            password_hash VARCHAR(255) NOT NULL,
            especialidad VARCHAR(255),
            fecha_registro TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ),
    (
        "pacientes",
        r#"
        CREATE TABLE IF NOT EXISTS pacientes (
            id SERIAL PRIMARY KEY,
            medico_id INT NOT NULL REFERENCES medicos(id) ON DELETE CASCADE,
            nombre VARCHAR(255) NOT NULL,
            edad INTEGER,
            email VARCHAR(255),
            telefono VARCHAR(50),
            historial TEXT,
            fecha_registro TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ),
    (
        "citas",
        r#"
        CREATE TABLE IF NOT EXISTS citas (
            id SERIAL PRIMARY KEY,
            paciente_id INT NOT NULL REFERENCES pacientes(id) ON DELETE CASCADE,
            medico_id INT NOT NULL REFERENCES medicos(id) ON DELETE CASCADE,
            fecha DATE NOT NULL,
            hora TIME NOT NULL,
            motivo TEXT,
            cancelada BOOLEAN NOT NULL DEFAULT FALSE
        )
        "#,
    ),
    // Tables created by earlier deployments have no history column.
    (
        "pacientes.historial",
        "ALTER TABLE pacientes ADD COLUMN IF NOT EXISTS historial TEXT",
    ),
    (
        "citas_sin_duplicados",
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS citas_sin_duplicados
            ON citas (medico_id, paciente_id, fecha, hora, motivo)
        "#,
    ),
];

/// Create missing tables. Returns how many statements succeeded.
pub async fn init_schema(pool: &PgPool) -> usize {
    let mut applied = 0;

    for (name, statement) in SCHEMA_STATEMENTS {
        match sqlx::query(statement).execute(pool).await {
            Ok(_) => applied += 1,
            Err(e) => error!(object = %name, error = %e, "Error initializing database schema"),
        }
    }

    info!(
        applied,
        total = SCHEMA_STATEMENTS.len(),
        "Database schema initialization finished"
    );

    applied
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(name: &str) -> usize {
        SCHEMA_STATEMENTS
            .iter()
            .position(|(n, _)| *n == name)
            .unwrap()
    }

    #[test]
    fn test_tables_created_in_dependency_order() {
        assert!(position("medicos") < position("pacientes"));
        assert!(position("pacientes") < position("citas"));
        assert!(position("citas") < position("citas_sin_duplicados"));
    }

    #[test]
    fn test_statements_are_idempotent() {
        for (name, statement) in SCHEMA_STATEMENTS {
            assert!(
                statement.contains("IF NOT EXISTS"),
                "statement for {} is not idempotent",
                name
            );
        }
    }

    #[test]
    fn test_foreign_keys_cascade() {
        let (_, pacientes) = SCHEMA_STATEMENTS[position("pacientes")];
        let (_, citas) = SCHEMA_STATEMENTS[position("citas")];

        assert!(pacientes.contains("REFERENCES medicos(id) ON DELETE CASCADE"));
        assert!(citas.contains("REFERENCES pacientes(id) ON DELETE CASCADE"));
        assert!(citas.contains("REFERENCES medicos(id) ON DELETE CASCADE"));
    }
}
