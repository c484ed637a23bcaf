//! Point-buy ability score validation (D&D 5e).
//!
//! Each score from 8 to 15 has a fixed cost; the six costs must fit in a
//! budget of 27 points.

use thiserror::Error;

use crate::character::Abilities;

/// Total points available for ability scores.
pub const POINT_BUY_BUDGET: u32 = 27;

/// Lowest and highest purchasable score.
pub const MIN_SCORE: u8 = 8;
pub const MAX_SCORE: u8 = 15;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PointBuyError {
    #[error("{ability} score {score} is outside the point-buy range 8..=15")]
    OutOfRange { ability: &'static str, score: u8 },

    #[error("point total {spent} exceeds the budget of {budget} by {excess}")]
    OverBudget { spent: u32, budget: u32, excess: u32 },
}

impl PointBuyError {
    /// Localized message for interactive surfaces.
    pub fn user_message(&self) -> String {
        match self {
            PointBuyError::OutOfRange { ability, score } => format!(
                "⚠️ Erro: {} deve estar entre {} e {} (recebido {}).",
                ability, MIN_SCORE, MAX_SCORE, score
            ),
            PointBuyError::OverBudget {
                spent,
                budget,
                excess,
            } => format!(
                "⚠️ Erro: Total de pontos ({}) excede o limite de {} pontos (excesso de {}).",
                spent, budget, excess
            ),
        }
    }
}

/// Cost of a single score, or `None` if it cannot be bought.
pub fn point_cost(score: u8) -> Option<u32> {
    match score {
        8 => Some(0),
        9 => Some(1),
        10 => Some(2),
        11 => Some(3),
        12 => Some(4),
        13 => Some(5),
        14 => Some(7),
        15 => Some(9),
        _ => None,
    }
}

/// Validate six scores against the budget, returning the points spent.
pub fn validate(abilities: &Abilities) -> Result<u32, PointBuyError> {
    let mut spent = 0;
    for (ability, score) in abilities.named() {
        spent += point_cost(score).ok_or(PointBuyError::OutOfRange { ability, score })?;
    }
    if spent > POINT_BUY_BUDGET {
        return Err(PointBuyError::OverBudget {
            spent,
            budget: POINT_BUY_BUDGET,
            excess: spent - POINT_BUY_BUDGET,
        });
    }
    Ok(spent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(s: [u8; 6]) -> Abilities {
        Abilities::from_slice(&s).unwrap()
    }

    #[test]
    fn cost_table() {
        let costs: Vec<_> = (8..=15).map(|s| point_cost(s).unwrap()).collect();
        assert_eq!(costs, vec![0, 1, 2, 3, 4, 5, 7, 9]);
        assert_eq!(point_cost(7), None);
        assert_eq!(point_cost(16), None);
    }

    #[test]
    fn single_fifteen_is_accepted() {
        assert_eq!(validate(&scores([8, 8, 8, 8, 8, 15])), Ok(9));
    }

    #[test]
    fn exactly_at_budget_is_accepted() {
        assert_eq!(validate(&scores([15, 15, 15, 8, 8, 8])), Ok(27));
    }

    #[test]
    fn over_budget_reports_excess() {
        assert_eq!(
            validate(&scores([15, 15, 15, 15, 8, 8])),
            Err(PointBuyError::OverBudget {
                spent: 36,
                budget: 27,
                excess: 9
            })
        );
    }

    #[test]
    fn over_budget_message_shows_the_excess() {
        let err = validate(&scores([15, 15, 15, 15, 8, 8])).unwrap_err();
        assert_eq!(
            err.user_message(),
            "⚠️ Erro: Total de pontos (36) excede o limite de 27 pontos (excesso de 9)."
        );
    }

    #[test]
    fn out_of_range_names_the_ability() {
        let err = validate(&scores([8, 8, 8, 8, 8, 16])).unwrap_err();
        assert_eq!(
            err,
            PointBuyError::OutOfRange {
                ability: "Carisma",
                score: 16
            }
        );
        assert!(err.user_message().contains("Carisma"));
    }

    #[test]
    fn standard_array_costs() {
        // 15, 14, 13, 12, 10, 8 = 9 + 7 + 5 + 4 + 2 + 0
        assert_eq!(validate(&scores([15, 14, 13, 12, 10, 8])), Ok(27));
    }
}
