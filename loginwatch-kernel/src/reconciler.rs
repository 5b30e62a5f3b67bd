/**
 * RECONCILER - Machine à états occupied / free / offline par hôte
 *
 * RÔLE : À partir de l'état stocké d'un hôte et du résultat d'une sonde, calcule
 * l'état suivant et indique s'il a changé de façon visible ("dirty").
 *
 * FONCTIONNEMENT :
 * - Utilisateurs présents      => occupied immédiatement (nouvelle liste = dirty)
 * - Plus personne connecté     => occupied maintenu HOLD_OCCUPIED_SEC avant de passer free
 * - Sonde en échec             => offline seulement après OFFLINE_AFTER_SEC sans succès
 *
 * Fonction pure : aucune I/O, le temps est un paramètre.
 */

use crate::models::{HostState, HostStatus, ProbeOutcome};
use serde::{Deserialize, Serialize};

/// Comportement d'un hôte offline qui redevient joignable sans session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineRecovery {
    /// Reste offline jusqu'à la prochaine session (comportement historique)
    #[default]
    Stay,
    /// Repasse free après la même fenêtre de maintien que occupied -> free
    ReleaseAfterHold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HysteresisPolicy {
    pub hold_occupied_secs: i64,
    pub offline_after_secs: i64,
    pub offline_recovery: OfflineRecovery,
}

impl Default for HysteresisPolicy {
    fn default() -> Self {
        Self {
            hold_occupied_secs: 600,
            offline_after_secs: 600,
            offline_recovery: OfflineRecovery::Stay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub previous: HostStatus,
    pub dirty: bool,
}

pub fn reconcile(
    state: &mut HostState,
    outcome: &ProbeOutcome,
    now: i64,
    policy: &HysteresisPolicy,
) -> Reconciliation {
    let previous = state.status;
    let dirty = match outcome {
        ProbeOutcome::Reachable(users) => {
            state.last_ok = Some(now);
            if users.is_empty() {
                on_empty(state, now, policy)
            } else {
                on_users(state, users)
            }
        }
        ProbeOutcome::Unreachable => on_failure(state, now, policy),
    };

    Reconciliation { previous, dirty }
}

fn on_users(state: &mut HostState, users: &[String]) -> bool {
    // toute session interrompt le compte à rebours en cours
    state.first_empty_ts = None;
    if state.status != HostStatus::Occupied || state.last_users != users {
        state.status = HostStatus::Occupied;
        state.last_users = users.to_vec();
        true
    } else {
        false
    }
}

fn on_empty(state: &mut HostState, now: i64, policy: &HysteresisPolicy) -> bool {
    match state.status {
        HostStatus::Occupied => release_after_hold(state, now, policy.hold_occupied_secs),
        HostStatus::Offline => match policy.offline_recovery {
            OfflineRecovery::Stay => {
                state.first_empty_ts.get_or_insert(now);
                false
            }
            OfflineRecovery::ReleaseAfterHold => {
                release_after_hold(state, now, policy.hold_occupied_secs)
            }
        },
        HostStatus::Free => false,
    }
}

fn release_after_hold(state: &mut HostState, now: i64, hold_secs: i64) -> bool {
    let since = *state.first_empty_ts.get_or_insert(now);
    if now - since >= hold_secs {
        state.status = HostStatus::Free;
        state.last_users.clear();
        state.first_empty_ts = None;
        true
    } else {
        false
    }
}

fn on_failure(state: &mut HostState, now: i64, policy: &HysteresisPolicy) -> bool {
    if state.status == HostStatus::Offline {
        return false;
    }

    // jamais joignable : la fenêtre de grâce part de la création
    let reference = state.last_ok.or(state.created_at).unwrap_or(state.last_update);
    if now - reference >= policy.offline_after_secs {
        state.status = HostStatus::Offline;
        state.last_users.clear();
        state.first_empty_ts = None;
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000;

    fn users(list: &[&str]) -> ProbeOutcome {
        ProbeOutcome::Reachable(list.iter().map(|u| u.to_string()).collect())
    }

    fn occupied_by(list: &[&str], last_ok: i64) -> HostState {
        let mut st = HostState::new("srv-01", None, last_ok);
        st.status = HostStatus::Occupied;
        st.last_users = list.iter().map(|u| u.to_string()).collect();
        st.last_ok = Some(last_ok);
        st
    }

    #[test]
    fn test_new_users_mark_occupied() {
        let policy = HysteresisPolicy::default();
        let mut st = HostState::new("srv-01", None, T0);

        let r = reconcile(&mut st, &users(&["alice"]), T0, &policy);
        assert!(r.dirty);
        assert_eq!(r.previous, HostStatus::Free);
        assert_eq!(st.status, HostStatus::Occupied);
        assert_eq!(st.last_users, vec!["alice"]);
        assert_eq!(st.last_ok, Some(T0));
    }

    #[test]
    fn test_changed_user_set_is_dirty() {
        let policy = HysteresisPolicy::default();
        let mut st = occupied_by(&["alice"], T0);

        assert!(reconcile(&mut st, &users(&["alice", "bob"]), T0 + 15, &policy).dirty);
        assert_eq!(st.last_users, vec!["alice", "bob"]);
    }

    #[test]
    fn test_same_users_reset_countdown_silently() {
        let policy = HysteresisPolicy::default();
        let mut st = occupied_by(&["alice"], T0);
        st.first_empty_ts = Some(T0 - 100);

        let r = reconcile(&mut st, &users(&["alice"]), T0 + 15, &policy);
        assert!(!r.dirty);
        assert_eq!(st.first_empty_ts, None);
        assert_eq!(st.last_ok, Some(T0 + 15));
    }

    #[test]
    fn test_hold_window_before_free() {
        let policy = HysteresisPolicy { hold_occupied_secs: 600, ..Default::default() };
        let mut st = occupied_by(&["alice"], T0);

        assert!(!reconcile(&mut st, &users(&[]), T0 + 60, &policy).dirty);
        assert_eq!(st.status, HostStatus::Occupied);
        assert_eq!(st.first_empty_ts, Some(T0 + 60));

        // 599s après la première observation vide : toujours occupied
        assert!(!reconcile(&mut st, &users(&[]), T0 + 659, &policy).dirty);
        assert_eq!(st.status, HostStatus::Occupied);

        assert!(reconcile(&mut st, &users(&[]), T0 + 660, &policy).dirty);
        assert_eq!(st.status, HostStatus::Free);
        assert!(st.last_users.is_empty());
        assert_eq!(st.first_empty_ts, None);
    }

    #[test]
    fn test_zero_hold_releases_on_first_empty_probe() {
        let policy = HysteresisPolicy { hold_occupied_secs: 0, ..Default::default() };
        let mut st = occupied_by(&["alice"], T0);

        assert!(reconcile(&mut st, &users(&[]), T0 + 15, &policy).dirty);
        assert_eq!(st.status, HostStatus::Free);
    }

    #[test]
    fn test_free_host_with_no_users_is_noop() {
        let policy = HysteresisPolicy::default();
        let mut st = HostState::new("srv-01", None, T0);

        assert!(!reconcile(&mut st, &users(&[]), T0 + 15, &policy).dirty);
        assert_eq!(st.status, HostStatus::Free);
        assert_eq!(st.first_empty_ts, None);
        assert_eq!(st.last_ok, Some(T0 + 15));
    }

    #[test]
    fn test_failures_within_grace_window() {
        let policy = HysteresisPolicy { offline_after_secs: 600, ..Default::default() };
        let mut st = occupied_by(&["alice"], T0);

        for t in [T0 + 100, T0 + 599] {
            assert!(!reconcile(&mut st, &ProbeOutcome::Unreachable, t, &policy).dirty);
            assert_eq!(st.status, HostStatus::Occupied);
            assert_eq!(st.last_ok, Some(T0));
        }

        assert!(reconcile(&mut st, &ProbeOutcome::Unreachable, T0 + 601, &policy).dirty);
        assert_eq!(st.status, HostStatus::Offline);
        assert!(st.last_users.is_empty());

        // déjà offline : plus rien à signaler
        assert!(!reconcile(&mut st, &ProbeOutcome::Unreachable, T0 + 700, &policy).dirty);
    }

    #[test]
    fn test_never_reachable_host_goes_offline_after_grace_since_creation() {
        let policy = HysteresisPolicy { offline_after_secs: 600, ..Default::default() };
        let mut st = HostState::new("srv-09", None, T0);

        assert!(!reconcile(&mut st, &ProbeOutcome::Unreachable, T0 + 30, &policy).dirty);
        assert_eq!(st.status, HostStatus::Free);

        assert!(reconcile(&mut st, &ProbeOutcome::Unreachable, T0 + 600, &policy).dirty);
        assert_eq!(st.status, HostStatus::Offline);
        assert_eq!(st.last_ok, None);
    }

    #[test]
    fn test_grace_window_ignores_later_writes() {
        let policy = HysteresisPolicy { offline_after_secs: 600, ..Default::default() };
        let mut st = HostState::new("srv-09", None, T0);

        let mut t = T0;
        while t < T0 + 600 {
            assert!(!reconcile(&mut st, &ProbeOutcome::Unreachable, t, &policy).dirty);
            // écriture de fin de cycle
            st.last_update = t;
            t += 15;
        }
        assert!(reconcile(&mut st, &ProbeOutcome::Unreachable, T0 + 600, &policy).dirty);
        assert_eq!(st.status, HostStatus::Offline);
    }

    #[test]
    fn test_offline_with_no_users_stays_offline() {
        let policy = HysteresisPolicy { hold_occupied_secs: 600, ..Default::default() };
        let mut st = HostState::new("srv-01", None, T0);
        st.status = HostStatus::Offline;

        assert!(!reconcile(&mut st, &users(&[]), T0, &policy).dirty);
        assert_eq!(st.first_empty_ts, Some(T0));
        assert!(!reconcile(&mut st, &users(&[]), T0 + 10_000, &policy).dirty);
        assert_eq!(st.status, HostStatus::Offline);
        assert_eq!(st.first_empty_ts, Some(T0));

        assert!(reconcile(&mut st, &users(&["bob"]), T0 + 10_015, &policy).dirty);
        assert_eq!(st.status, HostStatus::Occupied);
        assert_eq!(st.first_empty_ts, None);
    }

    #[test]
    fn test_offline_release_after_hold_policy() {
        let policy = HysteresisPolicy {
            hold_occupied_secs: 600,
            offline_after_secs: 600,
            offline_recovery: OfflineRecovery::ReleaseAfterHold,
        };
        let mut st = HostState::new("srv-01", None, T0);
        st.status = HostStatus::Offline;

        assert!(!reconcile(&mut st, &users(&[]), T0, &policy).dirty);
        assert!(!reconcile(&mut st, &users(&[]), T0 + 599, &policy).dirty);
        assert_eq!(st.status, HostStatus::Offline);

        assert!(reconcile(&mut st, &users(&[]), T0 + 600, &policy).dirty);
        assert_eq!(st.status, HostStatus::Free);
        assert_eq!(st.first_empty_ts, None);
    }

    #[test]
    fn test_identical_outcomes_are_dirty_at_most_once() {
        let policy = HysteresisPolicy::default();
        let outcomes = [users(&["alice"]), users(&[]), ProbeOutcome::Unreachable];

        for outcome in outcomes {
            let mut st = occupied_by(&["carol"], T0);
            let first = reconcile(&mut st, &outcome, T0 + 700, &policy).dirty;
            let second = reconcile(&mut st, &outcome, T0 + 715, &policy).dirty;
            assert!(!(first && second), "outcome {:?} was dirty twice", outcome);
        }
    }
}
