use sense_core::SuccessConditions;

/// The three success sub-checks of one turn, kept separate for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessCheck {
    pub ready_ok: bool,
    pub trust_ok: bool,
    pub concerns_ok: bool,
}

impl SuccessCheck {
    pub fn evaluate(
        conditions: &SuccessConditions,
        trust_level: i32,
        profile_threshold: i32,
        concerns_addressed: usize,
        ready_to_open_account: bool,
    ) -> Self {
        let ready_ok = !conditions.requires_ready_to_open_account || ready_to_open_account;
        // An explicit minimum wins over the profile's own threshold.
        let trust_ok = match conditions.min_trust_level {
            Some(min) => trust_level >= min,
            None if conditions.trust_at_least_profile_threshold => trust_level >= profile_threshold,
            None => true,
        };
        let concerns_ok = concerns_addressed >= conditions.min_concerns_addressed;
        Self {
            ready_ok,
            trust_ok,
            concerns_ok,
        }
    }

    pub fn passed(&self) -> bool {
        self.ready_ok && self.trust_ok && self.concerns_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_requires_ready_and_threshold() {
        let c = SuccessConditions::default();
        assert!(!SuccessCheck::evaluate(&c, 8, 8, 0, false).passed());
        assert!(!SuccessCheck::evaluate(&c, 7, 8, 0, true).passed());
        assert!(SuccessCheck::evaluate(&c, 8, 8, 0, true).passed());
    }

    #[test]
    fn test_min_trust_level_overrides_threshold() {
        let c = SuccessConditions {
            min_trust_level: Some(3),
            ..SuccessConditions::default()
        };
        assert!(SuccessCheck::evaluate(&c, 3, 9, 0, true).passed());
        assert!(!SuccessCheck::evaluate(&c, 2, 1, 0, true).trust_ok);
    }

    #[test]
    fn test_everything_optional() {
        let c = SuccessConditions {
            requires_ready_to_open_account: false,
            min_concerns_addressed: 0,
            trust_at_least_profile_threshold: false,
            min_trust_level: None,
        };
        assert!(SuccessCheck::evaluate(&c, 0, 10, 0, false).passed());
    }

    #[test]
    fn test_concern_minimum() {
        let c = SuccessConditions {
            min_concerns_addressed: 2,
            ..SuccessConditions::default()
        };
        let check = SuccessCheck::evaluate(&c, 9, 8, 1, true);
        assert!(check.ready_ok && check.trust_ok && !check.concerns_ok);
    }
}
