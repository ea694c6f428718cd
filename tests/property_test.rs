use proptest::prelude::*;
use ticket_sync::domain::intent::{IntentAction, IntentStatus};
use ticket_sync::domain::money::MoneyAmount;
use ticket_sync::domain::ticket::TicketStatus;

fn arb_intent_status() -> impl Strategy<Value = IntentStatus> {
    prop_oneof![
        Just(IntentStatus::Pending),
        Just(IntentStatus::Completed),
        Just(IntentStatus::Rejected),
    ]
}

fn arb_ticket_status() -> impl Strategy<Value = TicketStatus> {
    prop_oneof![
        Just(TicketStatus::Active),
        Just(TicketStatus::Used),
        Just(TicketStatus::Cancelled),
    ]
}

proptest! {
    /// Terminal intent states answer every request with AlreadyTerminal.
    #[test]
    fn terminal_intents_are_sticky(target in arb_intent_status()) {
        for terminal in [IntentStatus::Completed, IntentStatus::Rejected] {
            prop_assert_eq!(terminal.decide(&target), IntentAction::AlreadyTerminal(terminal));
        }
    }

    /// Any delivery order changes status at most once, and the first
    /// terminal target wins.
    #[test]
    fn random_delivery_order_settles_once(
        steps in prop::collection::vec(arb_intent_status(), 1..30)
    ) {
        let mut current = IntentStatus::Pending;
        let mut advances = 0u32;
        for target in &steps {
            if current.decide(target) == IntentAction::Advance {
                current = *target;
                advances += 1;
            }
        }
        prop_assert!(advances <= 1, "got {advances} advances for {steps:?}");
        let first_terminal = steps.iter().find(|s| s.is_terminal()).copied();
        prop_assert_eq!(current, first_terminal.unwrap_or(IntentStatus::Pending));
    }

    #[test]
    fn intent_status_roundtrip(status in arb_intent_status()) {
        prop_assert_eq!(IntentStatus::try_from(status.as_str()).unwrap(), status);
    }

    /// A ticket leaves `active` at most once.
    #[test]
    fn ticket_walk_has_at_most_one_step(
        steps in prop::collection::vec(arb_ticket_status(), 1..20)
    ) {
        let mut current = TicketStatus::Active;
        let mut moves = 0u32;
        for next in &steps {
            if current.can_transition_to(next) {
                current = *next;
                moves += 1;
            }
        }
        prop_assert!(moves <= 1, "got {moves} moves for {steps:?}");
    }

    /// Shares always sum back to the total and differ by at most one cent.
    #[test]
    fn split_evenly_preserves_total(cents in 0i64..=10_000_000_000, parts in 1u32..=50) {
        let shares = MoneyAmount::new(cents).unwrap().split_evenly(parts).unwrap();
        prop_assert_eq!(shares.len(), parts as usize);
        let sum: i64 = shares.iter().map(MoneyAmount::cents).sum();
        prop_assert_eq!(sum, cents);
        let max = shares.iter().map(MoneyAmount::cents).max().unwrap();
        let min = shares.iter().map(MoneyAmount::cents).min().unwrap();
        prop_assert!(max - min <= 1);
    }

    /// checked_add matches i64::checked_add: never silently overflows.
    #[test]
    fn money_add_never_silently_overflows(a in 0i64..=i64::MAX, b in 0i64..=i64::MAX) {
        let result = MoneyAmount::new(a).unwrap().checked_add(MoneyAmount::new(b).unwrap());
        match a.checked_add(b) {
            Some(expected) => prop_assert_eq!(result.unwrap().cents(), expected),
            None => prop_assert!(result.is_none()),
        }
    }

    #[test]
    fn major_units_roundtrip(cents in 0i64..=1_000_000_000) {
        let amount = MoneyAmount::new(cents).unwrap();
        prop_assert_eq!(MoneyAmount::from_major_units(amount.as_major_units()).unwrap(), amount);
    }
}
