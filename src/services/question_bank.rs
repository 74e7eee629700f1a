//! Parsing of raw sheet rows into multiple-choice question banks.

use tracing::info;

use crate::{
    dao::models::McqQuestionEntity,
    dto::admin::QuestionBankImportResponse,
    error::ServiceError,
    state::{
        SharedState,
        game::{McqQuestion, Round},
    },
};

const ROW_CELLS: usize = 6;

/// Turn sheet rows `[question, option1..4, correct]` into questions.
///
/// A leading header row is skipped. Short rows are dropped but still consume
/// an id so ids keep matching sheet positions.
pub fn parse_rows(rows: &[Vec<String>]) -> Vec<McqQuestion> {
    let body = match rows.first() {
        Some(first) if is_header(first) => &rows[1..],
        _ => rows,
    };

    body.iter()
        .enumerate()
        .filter(|(_, row)| row.len() >= ROW_CELLS)
        .map(|(index, row)| {
            let options = [
                row[1].trim().to_owned(),
                row[2].trim().to_owned(),
                row[3].trim().to_owned(),
                row[4].trim().to_owned(),
            ];
            let correct = parse_correct(&row[5], &options);
            McqQuestion {
                id: u32::try_from(index + 1).unwrap_or(u32::MAX),
                text: row[0].trim().to_owned(),
                options,
                correct,
            }
        })
        .collect()
}

fn is_header(row: &[String]) -> bool {
    row.first()
        .is_some_and(|cell| cell.trim().to_lowercase().starts_with("question"))
}

/// Resolve the answer cell to an option index in `0..=3`.
///
/// Accepts `"2"`, `"B"`, `"Option 2"` or the option text itself; anything
/// else falls back to the first option.
pub fn parse_correct(cell: &str, options: &[String; 4]) -> usize {
    let cell = cell.trim();
    let index = if let Ok(number) = cell.parse::<usize>() {
        number.saturating_sub(1)
    } else if let Some(letter) = single_letter(cell) {
        usize::from(letter - b'A')
    } else if let Some(number) = option_number(cell) {
        number.saturating_sub(1)
    } else {
        options
            .iter()
            .position(|option| option == cell)
            .unwrap_or(0)
    };
    index.min(3)
}

fn single_letter(cell: &str) -> Option<u8> {
    match cell.as_bytes() {
        [byte] => {
            let upper = byte.to_ascii_uppercase();
            (b'A'..=b'D').contains(&upper).then_some(upper)
        }
        _ => None,
    }
}

fn option_number(cell: &str) -> Option<usize> {
    let lower = cell.to_lowercase();
    lower.strip_prefix("option")?.trim().parse().ok()
}

/// Replace the question bank of round one or two with the parsed `rows`.
pub async fn import(
    state: &SharedState,
    round: u8,
    rows: &[Vec<String>],
) -> Result<QuestionBankImportResponse, ServiceError> {
    let round = match Round::try_from(round) {
        Ok(round @ (Round::One | Round::Two)) => round,
        _ => {
            return Err(ServiceError::InvalidInput(format!(
                "question banks exist for rounds 1 and 2 only, got {round}"
            )));
        }
    };

    let questions = parse_rows(rows);
    if questions.is_empty() {
        return Err(ServiceError::InvalidInput(
            "no usable question rows found".into(),
        ));
    }

    let store = state.require_quiz_store().await?;
    store
        .replace_question_bank(
            round,
            questions
                .iter()
                .cloned()
                .map(McqQuestionEntity::from)
                .collect(),
        )
        .await?;

    let imported = questions.len();
    state.set_question_bank(round, questions);
    info!(%round, imported, "question bank imported");

    Ok(QuestionBankImportResponse {
        round: round.number(),
        imported,
    })
}
