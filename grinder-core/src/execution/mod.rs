//! Execution engine (spec §4.5): expands a parametric GridPlan into concrete
//! per-level targets, diffs them against the current ExecutionState, and
//! produces a minimal, deterministic sequence of PLACE/REPLACE/CANCEL
//! actions.

use rust_decimal::Decimal;

use crate::data::{ExecutionState, GridPlan, Side, SymbolConstraints};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionKind {
    Cancel,
    Place,
    Replace,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub side: Side,
    pub level_id: String,
    pub order_id: Option<String>,
    pub price: Decimal,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Copy)]
pub struct ExecutionEngineConfig {
    /// Minimum absolute price delta that justifies a REPLACE rather than
    /// leaving a resting order untouched (spec §4.5 "reprice threshold").
    pub reprice_threshold: Decimal,
}

#[derive(Debug, Clone)]
struct DesiredLevel {
    side: Side,
    level_id: String,
    price: Decimal,
    quantity: Decimal,
}

const BPS_DIVISOR: i64 = 10_000;

/// Expands a GridPlan's parametric spacing/skew/size-schedule into concrete
/// per-level (side, level_id, price, quantity) targets (spec §4.4/§4.5).
/// Sell levels are numbered `1..=levels_up` above the (skewed) center; buy
/// levels `1..=levels_down` below it. `level_id` is the 1-based rung index
/// as a string, shared by both sides' numbering (level "1" means "nearest
/// the center" on whichever side it belongs to).
fn desired_levels(plan: &GridPlan, constraints: &SymbolConstraints) -> Vec<DesiredLevel> {
    let skewed_center = plan.center_price
        + plan.center_price * Decimal::from(plan.skew_bps) / Decimal::from(BPS_DIVISOR);

    let mut levels = Vec::with_capacity((plan.levels_up + plan.levels_down) as usize);

    for i in 1..=plan.levels_up {
        if let Some(&size) = plan.size_schedule.get((i - 1) as usize) {
            let offset = skewed_center * Decimal::from(plan.spacing_bps * i as i64) / Decimal::from(BPS_DIVISOR);
            levels.push(DesiredLevel {
                side: Side::Sell,
                level_id: i.to_string(),
                price: constraints.quantize_price(skewed_center + offset),
                quantity: constraints.quantize_qty(size),
            });
        }
    }
    for i in 1..=plan.levels_down {
        if let Some(&size) = plan.size_schedule.get((i - 1) as usize) {
            let offset = skewed_center * Decimal::from(plan.spacing_bps * i as i64) / Decimal::from(BPS_DIVISOR);
            levels.push(DesiredLevel {
                side: Side::Buy,
                level_id: i.to_string(),
                price: constraints.quantize_price(skewed_center - offset),
                quantity: constraints.quantize_qty(size),
            });
        }
    }
    levels
}

pub struct DiffResult {
    pub actions: Vec<Action>,
    pub skipped_min_qty: u32,
}

/// Computes the diff between `plan` and `state` (spec §4.5). Quantities
/// below `min_qty` are dropped; the caller logs the `MIN_QTY` reason code
/// once per `skipped_min_qty`.
pub fn diff(
    plan: &GridPlan,
    state: &ExecutionState,
    constraints: &SymbolConstraints,
    config: &ExecutionEngineConfig,
) -> DiffResult {
    let levels = desired_levels(plan, constraints);
    let mut skipped_min_qty = 0;
    let mut wanted = std::collections::BTreeMap::new();

    for level in levels {
        if level.quantity < constraints.min_qty {
            skipped_min_qty += 1;
            continue;
        }
        wanted.insert((level.side, level.level_id.clone()), level);
    }

    let mut cancels = Vec::new();
    let mut places = Vec::new();
    let mut replaces = Vec::new();

    for ((side, level_id), resting) in &state.active_orders {
        if !wanted.contains_key(&(*side, level_id.clone())) {
            cancels.push(Action {
                kind: ActionKind::Cancel,
                side: *side,
                level_id: level_id.clone(),
                order_id: Some(resting.order_id.clone()),
                price: Decimal::ZERO,
                quantity: Decimal::ZERO,
            });
        }
    }

    for (key, level) in &wanted {
        match state.active_orders.get(key) {
            None => places.push(Action {
                kind: ActionKind::Place,
                side: level.side,
                level_id: level.level_id.clone(),
                order_id: None,
                price: level.price,
                quantity: level.quantity,
            }),
            Some(resting) => {
                let price_delta = (level.price - resting.price).abs();
                let requoted = price_delta >= config.reprice_threshold || level.quantity != resting.quantity;
                if requoted {
                    replaces.push(Action {
                        kind: ActionKind::Replace,
                        side: level.side,
                        level_id: level.level_id.clone(),
                        order_id: Some(resting.order_id.clone()),
                        price: level.price,
                        quantity: level.quantity,
                    });
                }
            }
        }
    }

    cancels.sort_by(|a, b| (a.side, &a.level_id).cmp(&(b.side, &b.level_id)));
    places.sort_by(|a, b| (a.side, &a.level_id).cmp(&(b.side, &b.level_id)));
    replaces.sort_by(|a, b| (a.side, &a.level_id).cmp(&(b.side, &b.level_id)));

    let mut actions = cancels;
    actions.extend(places);
    actions.extend(replaces);

    DiffResult { actions, skipped_min_qty }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{GridMode, Regime, ResetAction};
    use rust_decimal_macros::dec;

    fn constraints() -> SymbolConstraints {
        SymbolConstraints {
            step_size: dec!(0.001),
            min_qty: dec!(0.001),
            tick_size: dec!(0.01),
        }
    }

    fn symmetric_plan(levels: u32, spacing_bps: i64, size: Decimal) -> GridPlan {
        GridPlan {
            mode: GridMode::Bilateral,
            center_price: dec!(50000),
            spacing_bps,
            levels_up: levels,
            levels_down: levels,
            size_schedule: vec![size; levels as usize],
            skew_bps: 0,
            regime: Regime::Range,
            width_bps: spacing_bps * levels as i64,
            reset_action: ResetAction::None,
            reason_codes: vec!["REGIME_RANGE".into()],
        }
    }

    #[test]
    fn expands_to_ten_places_on_empty_state() {
        let plan = symmetric_plan(5, 10, dec!(0.01));
        let state = ExecutionState::default();
        let result = diff(&plan, &state, &constraints(), &ExecutionEngineConfig { reprice_threshold: dec!(1) });
        assert_eq!(result.actions.len(), 10);
        assert!(result.actions.iter().all(|a| a.kind == ActionKind::Place));
        assert_eq!(result.actions.iter().filter(|a| a.side == Side::Buy).count(), 5);
        assert_eq!(result.actions.iter().filter(|a| a.side == Side::Sell).count(), 5);
    }

    #[test]
    fn nearest_buy_level_is_below_center_by_one_spacing_unit() {
        let plan = symmetric_plan(1, 10, dec!(0.01));
        let state = ExecutionState::default();
        let result = diff(&plan, &state, &constraints(), &ExecutionEngineConfig { reprice_threshold: dec!(1) });
        let buy = result.actions.iter().find(|a| a.side == Side::Buy).unwrap();
        assert_eq!(buy.price, dec!(49950));
    }

    #[test]
    fn cancels_undesired_level_ordered_before_places() {
        let plan = symmetric_plan(1, 10, dec!(0.01));
        let mut state = ExecutionState::default();
        state.set_order(Side::Buy, "99", "order-99".into(), dec!(1), dec!(0.01));
        let result = diff(&plan, &state, &constraints(), &ExecutionEngineConfig { reprice_threshold: dec!(1) });
        assert_eq!(result.actions[0].kind, ActionKind::Cancel);
        assert_eq!(result.actions[0].level_id, "99");
        assert!(result.actions[1..].iter().all(|a| a.kind == ActionKind::Place));
    }

    #[test]
    fn existing_level_with_price_beyond_threshold_produces_replace() {
        let plan = symmetric_plan(1, 10, dec!(0.01));
        let mut state = ExecutionState::default();
        // resting far from the plan's computed price (49950/50050) forces a replace
        state.set_order(Side::Buy, "1", "order-1".into(), dec!(40000), dec!(0.01));
        state.set_order(Side::Sell, "1", "order-2".into(), dec!(60000), dec!(0.01));
        let result = diff(&plan, &state, &constraints(), &ExecutionEngineConfig { reprice_threshold: dec!(1) });
        assert_eq!(result.actions.len(), 2);
        assert!(result.actions.iter().all(|a| a.kind == ActionKind::Replace));
    }

    #[test]
    fn existing_level_within_threshold_is_left_untouched() {
        let plan = symmetric_plan(1, 10, dec!(0.01));
        let mut state = ExecutionState::default();
        // nearest buy level is quantized to 49950; resting is within the 1.0 threshold
        state.set_order(Side::Buy, "1", "order-1".into(), dec!(49950), dec!(0.01));
        state.set_order(Side::Sell, "1", "order-2".into(), dec!(50050), dec!(0.01));
        let result = diff(&plan, &state, &constraints(), &ExecutionEngineConfig { reprice_threshold: dec!(1) });
        assert!(result.actions.is_empty());
    }

    #[test]
    fn quantity_change_always_triggers_replace_even_within_price_threshold() {
        let plan = symmetric_plan(1, 10, dec!(0.02));
        let mut state = ExecutionState::default();
        state.set_order(Side::Buy, "1", "order-1".into(), dec!(49950), dec!(0.01));
        state.set_order(Side::Sell, "1", "order-2".into(), dec!(50050), dec!(0.01));
        let result = diff(&plan, &state, &constraints(), &ExecutionEngineConfig { reprice_threshold: dec!(1) });
        assert_eq!(result.actions.len(), 2);
        assert!(result.actions.iter().all(|a| a.kind == ActionKind::Replace));
    }

    #[test]
    fn below_min_qty_is_skipped_and_counted() {
        let plan = symmetric_plan(1, 10, dec!(0.0001));
        let state = ExecutionState::default();
        let result = diff(&plan, &state, &constraints(), &ExecutionEngineConfig { reprice_threshold: dec!(1) });
        assert!(result.actions.is_empty());
        assert_eq!(result.skipped_min_qty, 2);
    }
}
