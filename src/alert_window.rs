//! Alert Popup Window (Windows)
//!
//! Small borderless topmost popup centered on the screen, closed by its
//! button or after `AUTO_DISMISS`. The UI thread also owns the global
//! toggle hotkey, delivered as a thread message.

use crate::hotkey::Hotkey;
use crate::monitor::ControlEvent;
use crate::notification::{DismissReason, Dismissal, Notifier, AUTO_DISMISS};
use crate::tracker::Alert;
use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};
use windows::core::w;
use windows::Win32::Foundation::{COLORREF, HINSTANCE, HWND, LPARAM, LRESULT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BeginPaint, CreatePen, CreateRoundRectRgn, CreateSolidBrush, DeleteObject, DrawTextW,
    EndPaint, FillRect, GetStockObject, RoundRect, SelectObject, SetBkMode, SetTextColor,
    SetWindowRgn, DEFAULT_GUI_FONT, DT_CENTER, DT_SINGLELINE, DT_VCENTER, DT_WORDBREAK, HDC,
    HGDIOBJ, PAINTSTRUCT, PS_SOLID, TRANSPARENT,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS, MOD_ALT, MOD_CONTROL, MOD_NOREPEAT,
    MOD_SHIFT, MOD_WIN,
};
use windows::Win32::UI::WindowsAndMessaging::*;

// Colors (BGR Format!)
const COLOR_BACKGROUND: u32 = 0x00332F2C; // #2C2F33
const COLOR_TEXT: u32 = 0x00FFFFFF;
const COLOR_BUTTON: u32 = 0x00DA8972; // #7289DA

// Layout constants
const POPUP_WIDTH: i32 = 360;
const POPUP_HEIGHT: i32 = 140;
const PADDING: i32 = 15;
const BUTTON_WIDTH: i32 = 80;
const BUTTON_HEIGHT: i32 = 28;
const CORNER_RADIUS: i32 = 12;

const WM_SHOW_ALERT: u32 = WM_APP + 1;
const HOTKEY_ID: i32 = 1;
const DISMISS_TIMER_ID: usize = 1;

/// Thread ID of the UI message loop
static UI_THREAD_ID: OnceCell<u32> = OnceCell::new();

struct PopupRequest {
    message: String,
    dismissal: Dismissal,
}

struct Popup {
    message: String,
    dismissal: Dismissal,
    reason: DismissReason,
}

lazy_static::lazy_static! {
    // Posted by the monitor thread, drained by the UI thread
    static ref PENDING: Mutex<Vec<PopupRequest>> = Mutex::new(Vec::new());
    // Open popups by HWND (as usize because HWND is not Send)
    static ref POPUPS: Mutex<HashMap<usize, Popup>> = Mutex::new(HashMap::new());
}

/// Notifier that posts alerts to the UI thread
pub struct WindowNotifier;

impl Notifier for WindowNotifier {
    fn notify(&self, alert: &Alert, message: &str, dismissal: Dismissal) -> Result<()> {
        let thread_id = *UI_THREAD_ID
            .get()
            .context("alert window thread is not running")?;

        PENDING.lock().push(PopupRequest {
            message: message.to_string(),
            dismissal: dismissal.clone(),
        });

        let posted = unsafe { PostThreadMessageW(thread_id, WM_SHOW_ALERT, WPARAM(0), LPARAM(0)) };
        if let Err(e) = posted {
            PENDING
                .lock()
                .retain(|r| !r.dismissal.same_alert(&dismissal));
            return Err(e).context("PostThreadMessageW failed");
        }

        debug!("Alert for {} posted to UI thread", alert.id);
        Ok(())
    }
}

/// UI thread state; created and run on the same thread
pub struct AlertWindow {
    instance: HINSTANCE,
    events: Sender<ControlEvent>,
    hotkey_registered: bool,
}

fn hotkey_modifiers(hotkey: &Hotkey) -> HOT_KEY_MODIFIERS {
    let mut mods = MOD_NOREPEAT;
    if hotkey.ctrl {
        mods |= MOD_CONTROL;
    }
    if hotkey.alt {
        mods |= MOD_ALT;
    }
    if hotkey.shift {
        mods |= MOD_SHIFT;
    }
    if hotkey.win {
        mods |= MOD_WIN;
    }
    mods
}

impl AlertWindow {
    /// Sets up the message queue, window class and hotkey on this thread
    pub fn init(hotkey: &Hotkey, events: Sender<ControlEvent>) -> Result<Self> {
        unsafe {
            // Make sure the thread has a message queue before anyone posts to it
            let mut msg = MSG::default();
            let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);

            let instance: HINSTANCE = GetModuleHandleW(None)
                .context("GetModuleHandleW failed")?
                .into();

            let wc = WNDCLASSW {
                style: CS_HREDRAW | CS_VREDRAW,
                lpfnWndProc: Some(popup_proc),
                hInstance: instance,
                hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
                lpszClassName: w!("RuntimeNudgeAlert"),
                ..Default::default()
            };
            if RegisterClassW(&wc) == 0 {
                debug!("Window class already registered");
            }

            let hotkey_registered =
                match RegisterHotKey(None, HOTKEY_ID, hotkey_modifiers(hotkey), hotkey.virtual_key()) {
                    Ok(()) => {
                        info!("Hotkey {} toggles monitoring", hotkey);
                        true
                    }
                    Err(e) => {
                        warn!("Could not register hotkey {}: {} (console 't' still works)", hotkey, e);
                        false
                    }
                };

            let _ = UI_THREAD_ID.set(GetCurrentThreadId());

            Ok(Self {
                instance,
                events,
                hotkey_registered,
            })
        }
    }

    /// Message loop; returns after `request_quit`
    pub fn run(self) {
        unsafe {
            let mut msg = MSG::default();
            while GetMessageW(&mut msg, None, 0, 0).as_bool() {
                if msg.hwnd.0.is_null() {
                    match msg.message {
                        WM_HOTKEY if msg.wParam.0 == HOTKEY_ID as usize => {
                            if self.events.send(ControlEvent::ToggleMonitoring).is_err() {
                                break;
                            }
                        }
                        WM_SHOW_ALERT => self.show_pending(),
                        _ => {}
                    }
                    continue;
                }
                let _ = TranslateMessage(&msg);
                let _ = DispatchMessageW(&msg);
            }

            if self.hotkey_registered {
                let _ = UnregisterHotKey(None, HOTKEY_ID);
            }

            // Close whatever is still open
            let open: Vec<usize> = POPUPS.lock().keys().copied().collect();
            for hwnd in open {
                let _ = DestroyWindow(HWND(hwnd as *mut _));
            }
        }
        debug!("Alert window loop ended");
    }

    unsafe fn show_pending(&self) {
        let requests: Vec<PopupRequest> = PENDING.lock().drain(..).collect();
        for request in requests {
            if let Err(e) = self.create_popup(&request) {
                error!("Could not create alert window: {:#}", e);
                request.dismissal.dismiss(DismissReason::Timeout);
            }
        }
    }

    unsafe fn create_popup(&self, request: &PopupRequest) -> Result<()> {
        let x = (GetSystemMetrics(SM_CXSCREEN) - POPUP_WIDTH) / 2;
        let y = (GetSystemMetrics(SM_CYSCREEN) - POPUP_HEIGHT) / 2;

        let hwnd = CreateWindowExW(
            WS_EX_TOPMOST | WS_EX_TOOLWINDOW,
            w!("RuntimeNudgeAlert"),
            w!("Runtime Nudge"),
            WS_POPUP,
            x,
            y,
            POPUP_WIDTH,
            POPUP_HEIGHT,
            None,
            None,
            self.instance,
            None,
        )
        .context("CreateWindowExW failed")?;

        POPUPS.lock().insert(
            hwnd.0 as usize,
            Popup {
                message: request.message.clone(),
                dismissal: request.dismissal.clone(),
                reason: DismissReason::Timeout,
            },
        );

        // Rounded corners
        let rgn = CreateRoundRectRgn(0, 0, POPUP_WIDTH + 1, POPUP_HEIGHT + 1, CORNER_RADIUS, CORNER_RADIUS);
        let _ = SetWindowRgn(hwnd, rgn, true);

        let _ = SetTimer(hwnd, DISMISS_TIMER_ID, AUTO_DISMISS.as_millis() as u32, None);
        let _ = ShowWindow(hwnd, SW_SHOWNOACTIVATE);

        info!("Alert window shown for {}", request.dismissal.id());
        Ok(())
    }
}

/// Ends the UI message loop (callable from any thread)
pub fn request_quit() {
    if let Some(&thread_id) = UI_THREAD_ID.get() {
        unsafe {
            let _ = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
        }
    }
}

fn button_rect() -> RECT {
    let left = (POPUP_WIDTH - BUTTON_WIDTH) / 2;
    let top = POPUP_HEIGHT - PADDING - BUTTON_HEIGHT;
    RECT {
        left,
        top,
        right: left + BUTTON_WIDTH,
        bottom: top + BUTTON_HEIGHT,
    }
}

/// Records why the popup closes, then destroys it (WM_DESTROY reports it)
unsafe fn close_popup(hwnd: HWND, reason: DismissReason) {
    if let Some(popup) = POPUPS.lock().get_mut(&(hwnd.0 as usize)) {
        popup.reason = reason;
    }
    let _ = KillTimer(hwnd, DISMISS_TIMER_ID);
    let _ = DestroyWindow(hwnd);
}

unsafe fn paint(hwnd: HWND, hdc: HDC) {
    let Some(message) = POPUPS
        .lock()
        .get(&(hwnd.0 as usize))
        .map(|p| p.message.clone())
    else {
        return;
    };

    let mut rect = RECT::default();
    let _ = GetClientRect(hwnd, &mut rect);

    let brush = CreateSolidBrush(COLORREF(COLOR_BACKGROUND));
    let _ = FillRect(hdc, &rect, brush);
    let _ = DeleteObject(HGDIOBJ(brush.0));

    let _ = SetBkMode(hdc, TRANSPARENT);
    let _ = SetTextColor(hdc, COLORREF(COLOR_TEXT));
    let old_font = SelectObject(hdc, GetStockObject(DEFAULT_GUI_FONT));

    // Message text above the button
    let button = button_rect();
    let mut text_rect = RECT {
        left: PADDING,
        top: PADDING,
        right: rect.right - PADDING,
        bottom: button.top - 8,
    };
    let mut text: Vec<u16> = message.encode_utf16().collect();
    let _ = DrawTextW(hdc, &mut text, &mut text_rect, DT_CENTER | DT_WORDBREAK);

    // Close button
    let brush = CreateSolidBrush(COLORREF(COLOR_BUTTON));
    let pen = CreatePen(PS_SOLID, 1, COLORREF(COLOR_BUTTON));
    let old_brush = SelectObject(hdc, brush);
    let old_pen = SelectObject(hdc, pen);
    let _ = RoundRect(hdc, button.left, button.top, button.right, button.bottom, 6, 6);
    SelectObject(hdc, old_brush);
    SelectObject(hdc, old_pen);
    let _ = DeleteObject(HGDIOBJ(brush.0));
    let _ = DeleteObject(HGDIOBJ(pen.0));

    let mut label: Vec<u16> = "关闭".encode_utf16().collect();
    let mut label_rect = button;
    let _ = DrawTextW(hdc, &mut label, &mut label_rect, DT_CENTER | DT_VCENTER | DT_SINGLELINE);

    SelectObject(hdc, old_font);
}

/// Window Procedure for alert popups
unsafe extern "system" fn popup_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_PAINT => {
            let mut ps = PAINTSTRUCT::default();
            let hdc = BeginPaint(hwnd, &mut ps);
            paint(hwnd, hdc);
            let _ = EndPaint(hwnd, &ps);
            LRESULT(0)
        }

        WM_LBUTTONUP => {
            let x = (lparam.0 & 0xFFFF) as i16 as i32;
            let y = ((lparam.0 >> 16) & 0xFFFF) as i16 as i32;
            let b = button_rect();
            if x >= b.left && x < b.right && y >= b.top && y < b.bottom {
                close_popup(hwnd, DismissReason::User);
            }
            LRESULT(0)
        }

        WM_TIMER if wparam.0 == DISMISS_TIMER_ID => {
            close_popup(hwnd, DismissReason::Timeout);
            LRESULT(0)
        }

        WM_DESTROY => {
            let popup = POPUPS.lock().remove(&(hwnd.0 as usize));
            if let Some(popup) = popup {
                popup.dismissal.dismiss(popup.reason);
            }
            LRESULT(0)
        }

        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}
