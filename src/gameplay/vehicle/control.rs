#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ControlMode {
    #[default]
    Auto,
    Manual,
}

impl ControlMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Auto => "Automatic",
            Self::Manual => "Manual",
        }
    }

    fn toggled(self) -> Self {
        match self {
            Self::Auto => Self::Manual,
            Self::Manual => Self::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKey {
    Forward,
    Backward,
    Left,
    Right,
}

impl ControlKey {
    pub const ALL: [ControlKey; 4] = [
        ControlKey::Forward,
        ControlKey::Backward,
        ControlKey::Left,
        ControlKey::Right,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeldKeys {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

impl HeldKeys {
    pub fn set(&mut self, key: ControlKey, held: bool) {
        match key {
            ControlKey::Forward => self.forward = held,
            ControlKey::Backward => self.backward = held,
            ControlKey::Left => self.left = held,
            ControlKey::Right => self.right = held,
        }
    }

    pub fn is_held(&self, key: ControlKey) -> bool {
        match key {
            ControlKey::Forward => self.forward,
            ControlKey::Backward => self.backward,
            ControlKey::Left => self.left,
            ControlKey::Right => self.right,
        }
    }

    /// +1 forward, -1 backward, 0 for neither or both.
    pub fn throttle(&self) -> f32 {
        let mut throttle = 0.0;
        if self.forward {
            throttle += 1.0;
        }
        if self.backward {
            throttle -= 1.0;
        }
        throttle
    }

    /// +1 left, -1 right. Right is evaluated last, so it wins when both are held.
    pub fn steer_sign(&self) -> f32 {
        let mut sign = 0.0;
        if self.left {
            sign = 1.0;
        }
        if self.right {
            sign = -1.0;
        }
        sign
    }

    pub fn describe(&self) -> String {
        let names: Vec<&str> = [
            (self.forward, "Fwd"),
            (self.backward, "Back"),
            (self.left, "Left"),
            (self.right, "Right"),
        ]
        .into_iter()
        .filter_map(|(held, name)| held.then_some(name))
        .collect();

        if names.is_empty() {
            "none".to_string()
        } else {
            names.join("+")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    KeyDown(ControlKey),
    KeyUp(ControlKey),
    Toggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlState {
    pub mode: ControlMode,
    pub held: HeldKeys,
}

impl ControlState {
    /// Applies one input event and returns the new mode if it changed.
    pub fn apply(&mut self, event: ControlEvent) -> Option<ControlMode> {
        let previous = self.mode;
        match event {
            ControlEvent::KeyDown(key) => {
                self.held.set(key, true);
                self.mode = ControlMode::Manual;
            }
            ControlEvent::KeyUp(key) => self.held.set(key, false),
            ControlEvent::Toggle => self.mode = self.mode.toggled(),
        }

        (self.mode != previous).then_some(self.mode)
    }
}

/// Events that bring `held` in line with the keys physically down this frame.
///
/// Presses become `KeyDown`. Any key that is held (or was just pressed) but is
/// no longer down becomes `KeyUp`, so releases missed while input was not read
/// and taps shorter than a frame both end up released.
pub fn held_key_events(
    held: &HeldKeys,
    just_pressed: impl Fn(ControlKey) -> bool,
    pressed: impl Fn(ControlKey) -> bool,
) -> Vec<ControlEvent> {
    let mut events = Vec::new();
    for key in ControlKey::ALL {
        let went_down = just_pressed(key);
        if went_down {
            events.push(ControlEvent::KeyDown(key));
        }
        if (went_down || held.is_held(key)) && !pressed(key) {
            events.push(ControlEvent::KeyUp(key));
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_auto_with_no_keys() {
        let state = ControlState::default();
        assert_eq!(state.mode, ControlMode::Auto);
        assert_eq!(state.held, HeldKeys::default());
    }

    #[test]
    fn toggle_flips_between_modes() {
        let mut state = ControlState::default();
        assert_eq!(state.apply(ControlEvent::Toggle), Some(ControlMode::Manual));
        assert_eq!(state.mode, ControlMode::Manual);
        assert_eq!(state.apply(ControlEvent::Toggle), Some(ControlMode::Auto));
        assert_eq!(state.mode, ControlMode::Auto);
    }

    #[test]
    fn toggle_ignores_held_keys() {
        let mut state = ControlState::default();
        state.apply(ControlEvent::KeyDown(ControlKey::Forward));
        assert_eq!(state.mode, ControlMode::Manual);

        state.apply(ControlEvent::Toggle);
        assert_eq!(state.mode, ControlMode::Auto);
        assert!(state.held.forward);
    }

    #[test]
    fn any_direction_key_enters_manual() {
        for key in [
            ControlKey::Forward,
            ControlKey::Backward,
            ControlKey::Left,
            ControlKey::Right,
        ] {
            let mut state = ControlState::default();
            assert_eq!(
                state.apply(ControlEvent::KeyDown(key)),
                Some(ControlMode::Manual)
            );
            assert!(state.held.is_held(key));
        }
    }

    #[test]
    fn key_down_in_manual_reports_no_change() {
        let mut state = ControlState::default();
        state.apply(ControlEvent::KeyDown(ControlKey::Left));
        assert_eq!(state.apply(ControlEvent::KeyDown(ControlKey::Right)), None);
        assert_eq!(state.mode, ControlMode::Manual);
    }

    #[test]
    fn key_up_never_changes_mode() {
        let mut state = ControlState::default();
        assert_eq!(state.apply(ControlEvent::KeyUp(ControlKey::Forward)), None);
        assert_eq!(state.mode, ControlMode::Auto);

        state.apply(ControlEvent::KeyDown(ControlKey::Forward));
        assert_eq!(state.apply(ControlEvent::KeyUp(ControlKey::Forward)), None);
        assert_eq!(state.mode, ControlMode::Manual);
        assert!(!state.held.forward);
    }

    #[test]
    fn throttle_cancels_when_both_held() {
        let keys = HeldKeys {
            forward: true,
            backward: true,
            ..HeldKeys::default()
        };
        assert_eq!(keys.throttle(), 0.0);
    }

    #[test]
    fn right_wins_when_both_steering_keys_held() {
        let keys = HeldKeys {
            left: true,
            right: true,
            ..HeldKeys::default()
        };
        assert_eq!(keys.steer_sign(), -1.0);
    }

    #[test]
    fn describe_lists_held_keys() {
        assert_eq!(HeldKeys::default().describe(), "none");
        let keys = HeldKeys {
            forward: true,
            left: true,
            ..HeldKeys::default()
        };
        assert_eq!(keys.describe(), "Fwd+Left");
    }

    fn apply_all(state: &mut ControlState, events: Vec<ControlEvent>) {
        for event in events {
            state.apply(event);
        }
    }

    #[test]
    fn press_and_hold_produces_single_key_down() {
        let mut state = ControlState::default();
        let events = held_key_events(
            &state.held,
            |key| key == ControlKey::Forward,
            |key| key == ControlKey::Forward,
        );
        assert_eq!(events, vec![ControlEvent::KeyDown(ControlKey::Forward)]);
        apply_all(&mut state, events);

        let events = held_key_events(&state.held, |_| false, |key| key == ControlKey::Forward);
        assert!(events.is_empty());
        assert!(state.held.forward);
    }

    #[test]
    fn tap_within_one_frame_ends_released() {
        let mut state = ControlState::default();
        let events = held_key_events(&state.held, |key| key == ControlKey::Left, |_| false);
        assert_eq!(
            events,
            vec![
                ControlEvent::KeyDown(ControlKey::Left),
                ControlEvent::KeyUp(ControlKey::Left)
            ]
        );
        apply_all(&mut state, events);

        assert_eq!(state.mode, ControlMode::Manual);
        assert!(!state.held.left);
    }

    #[test]
    fn release_missed_while_paused_is_recovered() {
        let mut state = ControlState::default();
        state.apply(ControlEvent::KeyDown(ControlKey::Forward));
        state.apply(ControlEvent::KeyDown(ControlKey::Right));

        // Forward was let go while input was not read; Right is still down.
        let events = held_key_events(&state.held, |_| false, |key| key == ControlKey::Right);
        assert_eq!(events, vec![ControlEvent::KeyUp(ControlKey::Forward)]);
        apply_all(&mut state, events);

        assert!(!state.held.forward);
        assert!(state.held.right);
        assert_eq!(state.held.throttle(), 0.0);
    }
}
