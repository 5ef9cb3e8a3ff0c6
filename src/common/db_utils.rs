use crate::common::error::AppError;

// ---
// Helper: traduz violações de chave única em um erro amigável
// ---
/// Converte `sqlx::Error` em `AppError`. Se for violação de UNIQUE, chama `describe`
/// com o nome da constraint para montar a mensagem; caso contrário vira DatabaseError.
pub(crate) fn map_unique_violation<F>(e: sqlx::Error, describe: F) -> AppError
where
    F: FnOnce(&str) -> String,
{
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or_default();
            return AppError::UniqueConstraintViolation(describe(constraint));
        }
    }
    e.into()
}

/// Junta linhas de anotação no formato usado pela coluna `notes` (uma por linha).
/// Linhas vazias são descartadas; `None` quando não sobra nada.
pub(crate) fn compose_note<I, S>(lines: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = lines
        .into_iter()
        .map(|l| l.as_ref().trim().to_string())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if joined.is_empty() { None } else { Some(joined) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_note_skips_blank_lines() {
        let note = compose_note(["Received quantity: 10", "  ", "Quality notes: ok"]);
        assert_eq!(note.as_deref(), Some("Received quantity: 10\nQuality notes: ok"));
        assert_eq!(compose_note(Vec::<String>::new()), None);
    }

    #[test]
    fn non_unique_errors_become_database_errors() {
        let err = map_unique_violation(sqlx::Error::RowNotFound, |_| "dup".into());
        assert!(matches!(err, AppError::DatabaseError(_)));
    }
}
