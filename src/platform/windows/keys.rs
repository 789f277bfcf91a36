//! Key name to virtual key code mapping

pub mod vk {
    pub const BACKSPACE: u16 = 0x08;
    pub const TAB: u16 = 0x09;
    pub const RETURN: u16 = 0x0D;
    pub const SHIFT: u16 = 0x10;
    pub const CONTROL: u16 = 0x11;
    pub const ALT: u16 = 0x12;
    pub const ESCAPE: u16 = 0x1B;
    pub const SPACE: u16 = 0x20;
    pub const PAGE_UP: u16 = 0x21;
    pub const PAGE_DOWN: u16 = 0x22;
    pub const END: u16 = 0x23;
    pub const HOME: u16 = 0x24;
    pub const LEFT: u16 = 0x25;
    pub const UP: u16 = 0x26;
    pub const RIGHT: u16 = 0x27;
    pub const DOWN: u16 = 0x28;
    pub const DELETE: u16 = 0x2E;
    pub const LWIN: u16 = 0x5B;
    pub const F1: u16 = 0x70;
}

/// Map a key name ("enter", "ctrl", "f5", "w") to a virtual key code
pub fn key_name_to_vk(name: &str) -> Option<u16> {
    let lower = name.trim().to_lowercase();
    match lower.as_str() {
        "backspace" => Some(vk::BACKSPACE),
        "tab" => Some(vk::TAB),
        "return" | "enter" => Some(vk::RETURN),
        "shift" => Some(vk::SHIFT),
        "ctrl" | "control" => Some(vk::CONTROL),
        "alt" | "option" | "menu" => Some(vk::ALT),
        "escape" | "esc" => Some(vk::ESCAPE),
        "space" => Some(vk::SPACE),
        "pageup" | "page_up" => Some(vk::PAGE_UP),
        "pagedown" | "page_down" => Some(vk::PAGE_DOWN),
        "end" => Some(vk::END),
        "home" => Some(vk::HOME),
        "left" | "arrow_left" => Some(vk::LEFT),
        "up" | "arrow_up" => Some(vk::UP),
        "right" | "arrow_right" => Some(vk::RIGHT),
        "down" | "arrow_down" => Some(vk::DOWN),
        "delete" | "del" => Some(vk::DELETE),
        "win" | "super" | "cmd" | "command" => Some(vk::LWIN),
        k if k.len() >= 2 && k.starts_with('f') => {
            let n: u16 = k[1..].parse().ok()?;
            (1..=24).contains(&n).then(|| vk::F1 + n - 1)
        }
        k if k.len() == 1 => {
            let c = k.chars().next()?.to_ascii_uppercase();
            (c.is_ascii_alphabetic() || c.is_ascii_digit()).then_some(c as u16)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_names() {
        assert_eq!(key_name_to_vk("Enter"), Some(vk::RETURN));
        assert_eq!(key_name_to_vk("w"), Some(0x57));
        assert_eq!(key_name_to_vk("5"), Some(0x35));
        assert_eq!(key_name_to_vk("f12"), Some(0x7B));
        assert_eq!(key_name_to_vk("f25"), None);
        assert_eq!(key_name_to_vk("hyper"), None);
    }
}
