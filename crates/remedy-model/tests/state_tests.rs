use proptest::prelude::*;
use remedy_model::state_machine::allowed_transitions;
use remedy_model::{AffectedResource, Incident, IncidentStatus, Severity};

fn any_status() -> impl Strategy<Value = IncidentStatus> {
    prop_oneof![
        Just(IncidentStatus::Open),
        Just(IncidentStatus::Remediating),
        Just(IncidentStatus::Resolved),
        Just(IncidentStatus::PartiallyRemediated),
        Just(IncidentStatus::FailedRemediation),
    ]
}

proptest! {
    #[test]
    fn prop_only_allowed_transitions_apply(requests in proptest::collection::vec(any_status(), 0..40)) {
        let mut incident = Incident::new(AffectedResource::unknown(), "Unknown", "", Severity::Low);

        for to in requests {
            let before = incident.status();
            let allowed = allowed_transitions(before).contains(&to);
            let result = incident.transition_to(to);

            // Invariant: a move happens iff it is an arrow of the lifecycle
            prop_assert_eq!(result.is_ok(), allowed);
            if allowed {
                prop_assert_eq!(incident.status(), to);
            } else {
                prop_assert_eq!(incident.status(), before);
            }
        }
    }

    #[test]
    fn prop_terminal_states_are_entered_from_remediating(requests in proptest::collection::vec(any_status(), 0..40)) {
        let mut incident = Incident::new(AffectedResource::unknown(), "Unknown", "", Severity::Low);

        for to in requests {
            let before = incident.status();
            if incident.transition_to(to).is_ok() && to.is_terminal() {
                prop_assert_eq!(before, IncidentStatus::Remediating);
            }
        }
    }
}

#[test]
fn test_resolved_absorbs_everything() {
    let mut incident = Incident::new(AffectedResource::unknown(), "Unknown", "", Severity::Low);
    incident.transition_to(IncidentStatus::Remediating).unwrap();
    incident.transition_to(IncidentStatus::Resolved).unwrap();

    for to in [
        IncidentStatus::Open,
        IncidentStatus::Remediating,
        IncidentStatus::Resolved,
        IncidentStatus::PartiallyRemediated,
        IncidentStatus::FailedRemediation,
    ] {
        assert!(incident.transition_to(to).is_err());
    }
    assert_eq!(incident.status(), IncidentStatus::Resolved);
}

#[test]
fn test_rollup_of_plan_outcomes() {
    use IncidentStatus::*;
    assert_eq!(IncidentStatus::rollup([Resolved, Resolved]), Resolved);
    assert_eq!(IncidentStatus::rollup([Resolved, FailedRemediation]), PartiallyRemediated);
    assert_eq!(IncidentStatus::rollup([FailedRemediation]), FailedRemediation);
}
