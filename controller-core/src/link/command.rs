//! Command catalog for the text protocol.
//!
//! Keywords are matched case-sensitively and exactly. Each command declares
//! the number of data fields it requires; frames that arrive short are
//! answered with the failure token instead of being partially executed.

/// Commands understood by the text protocol.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandId {
    PowerInfo,
    PowerOn,
    PowerOff,
    Shutdown,
    HidKeyboardPress,
    HidKeyboardHold,
    HidKeyboardRelease,
    HidKeyboardType,
    HidMouseMove,
    HidMousePress,
    HidMouseHold,
    HidMouseRelease,
    HidMouseScroll,
    HidGamepadPress,
    HidGamepadHold,
    HidGamepadRelease,
    HidGamepadLeftAxis,
    HidGamepadRightAxis,
    HidSystemPower,
    SystemInfo,
    SystemRestart,
    DeepSleepInfo,
    DeepSleepEnable,
    DeepSleepDisable,
    Help,
}

/// One entry in the fixed command table.
#[derive(Copy, Clone, Debug)]
pub struct CommandSpec {
    pub keyword: &'static str,
    pub id: CommandId,
    /// Data fields required after the keyword.
    pub required_args: usize,
}

impl CommandSpec {
    const fn new(keyword: &'static str, id: CommandId, required_args: usize) -> Self {
        Self {
            keyword,
            id,
            required_args,
        }
    }
}

/// The complete, fixed command table.
pub const COMMAND_TABLE: [CommandSpec; 25] = [
    CommandSpec::new("POWER_INFO", CommandId::PowerInfo, 0),
    CommandSpec::new("POWER_ON", CommandId::PowerOn, 0),
    CommandSpec::new("POWER_OFF", CommandId::PowerOff, 0),
    CommandSpec::new("SHUTDOWN", CommandId::Shutdown, 0),
    CommandSpec::new("HID_KEYBOARD_PRESS", CommandId::HidKeyboardPress, 1),
    CommandSpec::new("HID_KEYBOARD_HOLD", CommandId::HidKeyboardHold, 1),
    CommandSpec::new("HID_KEYBOARD_RELEASE", CommandId::HidKeyboardRelease, 1),
    CommandSpec::new("HID_KEYBOARD_TYPE", CommandId::HidKeyboardType, 1),
    CommandSpec::new("HID_MOUSE_MOVE", CommandId::HidMouseMove, 2),
    CommandSpec::new("HID_MOUSE_PRESS", CommandId::HidMousePress, 1),
    CommandSpec::new("HID_MOUSE_HOLD", CommandId::HidMouseHold, 1),
    CommandSpec::new("HID_MOUSE_RELEASE", CommandId::HidMouseRelease, 1),
    CommandSpec::new("HID_MOUSE_SCROLL", CommandId::HidMouseScroll, 2),
    CommandSpec::new("HID_GAMEPAD_PRESS", CommandId::HidGamepadPress, 1),
    CommandSpec::new("HID_GAMEPAD_HOLD", CommandId::HidGamepadHold, 1),
    CommandSpec::new("HID_GAMEPAD_RELEASE", CommandId::HidGamepadRelease, 1),
    CommandSpec::new("HID_GAMEPAD_LEFT_AXIS", CommandId::HidGamepadLeftAxis, 2),
    CommandSpec::new("HID_GAMEPAD_RIGHT_AXIS", CommandId::HidGamepadRightAxis, 2),
    CommandSpec::new("HID_SYSTEM_POWER", CommandId::HidSystemPower, 0),
    CommandSpec::new("SYSTEM_INFO", CommandId::SystemInfo, 0),
    CommandSpec::new("SYSTEM_RESTART", CommandId::SystemRestart, 0),
    CommandSpec::new("DEEP_SLEEP_INFO", CommandId::DeepSleepInfo, 0),
    CommandSpec::new("DEEP_SLEEP_ENABLE", CommandId::DeepSleepEnable, 0),
    CommandSpec::new("DEEP_SLEEP_DISABLE", CommandId::DeepSleepDisable, 0),
    CommandSpec::new("HELP", CommandId::Help, 0),
];

/// Exact, case-sensitive keyword lookup.
#[must_use]
pub fn lookup(keyword: &str) -> Option<&'static CommandSpec> {
    COMMAND_TABLE.iter().find(|spec| spec.keyword == keyword)
}

/// Success token for boolean-style commands.
pub const REPLY_OK: &str = "1";

/// Failure token for boolean-style commands.
pub const REPLY_FAIL: &str = "0";

/// Reply for keywords missing from the table. Unknown input always gets
/// this text, never the HELP listing.
pub const UNKNOWN_REPLY: &str =
    "Unknown command, type 'HELP' for a list of available commands.";

/// Reply for frames the splitter rejects outright.
pub const SYNTAX_REPLY: &str =
    "Malformed command, type 'HELP' for the expected format.";

/// Full listing returned by `HELP`.
pub const HELP_REPLY: &str = "Available Commands:\n\
\n\
=== System Commands ===\n\
POWER_INFO - Get battery/charger telemetry\n\
POWER_ON - Turn on SBC power\n\
POWER_OFF - Turn off SBC power\n\
SHUTDOWN - Shut the system down\n\
SYSTEM_INFO - Get system information\n\
SYSTEM_RESTART - Restart the controller\n\
\n\
=== HID Keyboard Commands ===\n\
HID_KEYBOARD_PRESS:KEY - Press and release key (ASCII code)\n\
HID_KEYBOARD_HOLD:KEY - Hold key down (ASCII code)\n\
HID_KEYBOARD_RELEASE:KEY - Release held key (ASCII code)\n\
HID_KEYBOARD_TYPE:TEXT - Type text string\n\
\n\
=== HID Mouse Commands ===\n\
HID_MOUSE_MOVE:X:Y - Move mouse by X,Y pixels\n\
HID_MOUSE_PRESS:BTN - Press and release mouse button\n\
HID_MOUSE_HOLD:BTN - Hold mouse button down\n\
HID_MOUSE_RELEASE:BTN - Release held mouse button\n\
HID_MOUSE_SCROLL:X:Y - Scroll mouse wheel X,Y units\n\
\n\
=== HID Gamepad Commands ===\n\
HID_GAMEPAD_PRESS:BTN - Press and release gamepad button\n\
HID_GAMEPAD_HOLD:BTN - Hold gamepad button down\n\
HID_GAMEPAD_RELEASE:BTN - Release held gamepad button\n\
HID_GAMEPAD_LEFT_AXIS:X:Y - Set left stick axes\n\
HID_GAMEPAD_RIGHT_AXIS:X:Y - Set right stick axes\n\
\n\
=== HID System Commands ===\n\
HID_SYSTEM_POWER - Send system power key\n\
\n\
=== Deep Sleep ===\n\
DEEP_SLEEP_INFO - Report watchdog state\n\
DEEP_SLEEP_ENABLE - Enable the sleep watchdog\n\
DEEP_SLEEP_DISABLE - Disable the sleep watchdog\n\
\n\
=== Help ===\n\
HELP - Show this command list\n\
\n\
Format: CMD:DATA|DATA... (use : after the keyword, | between data fields)";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_exact_and_case_sensitive() {
        assert_eq!(lookup("POWER_ON").map(|s| s.id), Some(CommandId::PowerOn));
        assert!(lookup("power_on").is_none());
        assert!(lookup("POWER_ON ").is_none());
        assert!(lookup("POWER").is_none());
    }

    #[test]
    fn table_keywords_are_unique() {
        for (index, spec) in COMMAND_TABLE.iter().enumerate() {
            for other in &COMMAND_TABLE[index + 1..] {
                assert_ne!(spec.keyword, other.keyword);
            }
        }
    }

    #[test]
    fn every_keyword_appears_in_help() {
        for spec in &COMMAND_TABLE {
            assert!(
                HELP_REPLY.contains(spec.keyword),
                "{} missing from HELP",
                spec.keyword
            );
        }
    }
}
