//! Windows input backend
//!
//! Uses SendInput for keyboard and mouse events and SetCursorPos/GetCursorPos
//! for the pointer.

mod keys;

pub use keys::key_name_to_vk;

use crate::error::{Error, ErrorCode, Result};
use crate::input::{InputSynthesizer, KeyMode, MouseButton, Point};
use std::time::Duration;

use windows::Win32::Foundation::POINT;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_KEYUP, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN,
    MOUSEEVENTF_MIDDLEUP, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_WHEEL,
    MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{GetCursorPos, SetCursorPos};

/// One wheel notch
const WHEEL_DELTA: i32 = 120;

pub struct WindowsSynthesizer;

impl WindowsSynthesizer {
    /// Probe the cursor once so a session without a desktop fails up front
    pub fn new() -> Result<Self> {
        let synth = Self;
        synth.current_position()?;
        Ok(synth)
    }
}

impl InputSynthesizer for WindowsSynthesizer {
    fn backend(&self) -> &'static str {
        "windows"
    }

    fn current_position(&self) -> Result<Point> {
        let mut pt = POINT::default();
        unsafe {
            GetCursorPos(&mut pt).map_err(|e| Error::action_failed("GetCursorPos", e))?;
        }
        Ok(Point::new(pt.x, pt.y))
    }

    fn move_to(&self, to: Point) -> Result<()> {
        unsafe {
            SetCursorPos(to.x, to.y).map_err(|e| Error::action_failed("SetCursorPos", e))?;
        }
        Ok(())
    }

    fn click(&self, at: Point, button: MouseButton, clicks: u32) -> Result<()> {
        self.move_to(at)?;
        std::thread::sleep(Duration::from_millis(10));

        let (down, up) = button_flags(button);
        for i in 0..clicks.max(1) {
            send_inputs(&[make_mouse_input(down, 0), make_mouse_input(up, 0)])?;
            if i + 1 < clicks {
                std::thread::sleep(Duration::from_millis(50));
            }
        }
        Ok(())
    }

    fn button(&self, button: MouseButton, mode: KeyMode) -> Result<()> {
        let (down, up) = button_flags(button);
        match mode {
            KeyMode::Down => send_inputs(&[make_mouse_input(down, 0)]),
            KeyMode::Up => send_inputs(&[make_mouse_input(up, 0)]),
            KeyMode::Press => send_inputs(&[make_mouse_input(down, 0), make_mouse_input(up, 0)]),
        }
    }

    fn key_event(&self, key: &str, mode: KeyMode) -> Result<()> {
        let vk = key_name_to_vk(key).ok_or_else(|| Error::invalid_key(key))?;
        match mode {
            KeyMode::Down => send_inputs(&[make_key_input(vk, false)]),
            KeyMode::Up => send_inputs(&[make_key_input(vk, true)]),
            KeyMode::Press => {
                send_inputs(&[make_key_input(vk, false), make_key_input(vk, true)])?;
                std::thread::sleep(Duration::from_millis(10));
                Ok(())
            }
        }
    }

    fn scroll(&self, amount: i32, at: Option<Point>) -> Result<()> {
        if let Some(at) = at {
            self.move_to(at)?;
        }
        send_inputs(&[make_mouse_input(MOUSEEVENTF_WHEEL, amount * WHEEL_DELTA)])
    }
}

fn button_flags(button: MouseButton) -> (MOUSE_EVENT_FLAGS, MOUSE_EVENT_FLAGS) {
    match button {
        MouseButton::Left => (MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP),
        MouseButton::Right => (MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP),
        MouseButton::Middle => (MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP),
    }
}

fn make_mouse_input(flags: MOUSE_EVENT_FLAGS, data: i32) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: data as u32,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn make_key_input(vk: u16, key_up: bool) -> INPUT {
    let flags = if key_up {
        KEYEVENTF_KEYUP
    } else {
        KEYBD_EVENT_FLAGS(0)
    };

    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(vk),
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send_inputs(inputs: &[INPUT]) -> Result<()> {
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };

    if sent as usize != inputs.len() {
        return Err(Error::new(
            ErrorCode::ActionFailed,
            format!("SendInput failed: sent {} of {} inputs", sent, inputs.len()),
        ));
    }

    Ok(())
}
