use winit::keyboard::KeyCode;

/// Lower-case key name used in configuration files and results.
///
/// Keys without a name are not reported to the experiment.
pub fn key_name(code: KeyCode) -> Option<&'static str> {
    use KeyCode::*;
    let name = match code {
        KeyA => "a",
        KeyB => "b",
        KeyC => "c",
        KeyD => "d",
        KeyE => "e",
        KeyF => "f",
        KeyG => "g",
        KeyH => "h",
        KeyI => "i",
        KeyJ => "j",
        KeyK => "k",
        KeyL => "l",
        KeyM => "m",
        KeyN => "n",
        KeyO => "o",
        KeyP => "p",
        KeyQ => "q",
        KeyR => "r",
        KeyS => "s",
        KeyT => "t",
        KeyU => "u",
        KeyV => "v",
        KeyW => "w",
        KeyX => "x",
        KeyY => "y",
        KeyZ => "z",
        Digit0 => "0",
        Digit1 => "1",
        Digit2 => "2",
        Digit3 => "3",
        Digit4 => "4",
        Digit5 => "5",
        Digit6 => "6",
        Digit7 => "7",
        Digit8 => "8",
        Digit9 => "9",
        Space => "space",
        Enter | NumpadEnter => "return",
        Escape => "escape",
        Backspace => "backspace",
        Tab => "tab",
        ArrowLeft => "left",
        ArrowRight => "right",
        ArrowUp => "up",
        ArrowDown => "down",
        ShiftLeft => "lshift",
        ShiftRight => "rshift",
        ControlLeft => "lctrl",
        ControlRight => "rctrl",
        F1 => "f1",
        F2 => "f2",
        F3 => "f3",
        F4 => "f4",
        F5 => "f5",
        F6 => "f6",
        F7 => "f7",
        F8 => "f8",
        F9 => "f9",
        F10 => "f10",
        F11 => "f11",
        F12 => "f12",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_keys_have_short_names() {
        assert_eq!(key_name(KeyCode::KeyC), Some("c"));
        assert_eq!(key_name(KeyCode::KeyM), Some("m"));
        assert_eq!(key_name(KeyCode::Space), Some("space"));
    }

    #[test]
    fn both_enter_keys_continue() {
        assert_eq!(key_name(KeyCode::Enter), Some("return"));
        assert_eq!(key_name(KeyCode::NumpadEnter), Some("return"));
    }

    #[test]
    fn abort_key_is_named() {
        assert_eq!(key_name(KeyCode::F7), Some("f7"));
    }

    #[test]
    fn unmapped_keys_are_dropped() {
        assert_eq!(key_name(KeyCode::MediaPlayPause), None);
    }
}
