//! Native Windows backend: a per-pixel-alpha layered window spanning the
//! virtual screen that never takes input, fed by a low-level mouse hook that
//! observes clicks without consuming them.

use crate::draw::input::{InkEvent, MouseButton};
use crate::draw::messages::InkSample;
use crate::draw::model::Point;
use crate::draw::overlay::{InputSource, OverlaySurface};
use crate::draw::render::RenderFrameBuffer;
use anyhow::{anyhow, Result};
use once_cell::sync::OnceCell;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Mutex;
use std::sync::Once;
use std::thread::JoinHandle;
use std::time::Duration;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{COLORREF, HANDLE, HWND, LPARAM, LRESULT, POINT, SIZE, WPARAM};
use windows::Win32::Graphics::Gdi::{
    CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, SelectObject, AC_SRC_ALPHA,
    AC_SRC_OVER, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, BLENDFUNCTION, DIB_RGB_COLORS, HBITMAP,
    HDC, HGDIOBJ,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetSystemMetrics,
    PeekMessageW, RegisterClassW, SetWindowPos, TranslateMessage, UpdateLayeredWindow,
    HWND_TOPMOST, MSG, PM_REMOVE, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
    SM_YVIRTUALSCREEN, SWP_NOACTIVATE, SWP_SHOWWINDOW, ULW_ALPHA, WINDOW_EX_STYLE, WINDOW_STYLE,
    WNDCLASSW, WS_EX_LAYERED, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_EX_TOPMOST,
    WS_EX_TRANSPARENT, WS_POPUP,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VirtualScreen {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl VirtualScreen {
    pub fn current() -> Self {
        unsafe {
            Self {
                x: GetSystemMetrics(SM_XVIRTUALSCREEN),
                y: GetSystemMetrics(SM_YVIRTUALSCREEN),
                width: GetSystemMetrics(SM_CXVIRTUALSCREEN).max(1),
                height: GetSystemMetrics(SM_CYVIRTUALSCREEN).max(1),
            }
        }
    }

    pub fn to_local(self, screen: (i32, i32)) -> Point {
        Point::new((screen.0 - self.x) as f32, (screen.1 - self.y) as f32)
    }
}

/// Click-through: `WS_EX_TRANSPARENT` on a layered window lets every mouse
/// message fall through to whatever is below.
pub fn compose_overlay_window_ex_style() -> WINDOW_EX_STYLE {
    WS_EX_LAYERED | WS_EX_TRANSPARENT | WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE
}

fn widestring(value: &str) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    std::ffi::OsStr::new(value)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

unsafe extern "system" fn overlay_wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
}

fn pump_overlay_messages() {
    unsafe {
        let mut msg = MSG::default();
        while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).into() {
            let _ = TranslateMessage(&msg);
            let _ = DispatchMessageW(&msg);
        }
    }
}

struct DibSection {
    mem_dc: HDC,
    dib: HBITMAP,
    old_bitmap: HGDIOBJ,
    bits: *mut u8,
    size_bytes: usize,
}

impl DibSection {
    fn create(width: i32, height: i32) -> Result<Self> {
        let mem_dc = unsafe { CreateCompatibleDC(HDC::default()) };
        if mem_dc.0.is_null() {
            return Err(anyhow!("CreateCompatibleDC failed"));
        }

        let mut bmi = BITMAPINFO::default();
        bmi.bmiHeader = BITMAPINFOHEADER {
            biSize: mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: width,
            biHeight: -height,
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        };

        let mut bits: *mut core::ffi::c_void = ptr::null_mut();
        let dib = match unsafe {
            CreateDIBSection(mem_dc, &bmi, DIB_RGB_COLORS, &mut bits, HANDLE::default(), 0)
        } {
            Ok(dib) if !bits.is_null() => dib,
            Ok(dib) => {
                unsafe {
                    let _ = DeleteObject(dib);
                    let _ = DeleteDC(mem_dc);
                }
                return Err(anyhow!("CreateDIBSection returned no pixel buffer"));
            }
            Err(err) => {
                unsafe {
                    let _ = DeleteDC(mem_dc);
                }
                return Err(anyhow!("CreateDIBSection failed: {err}"));
            }
        };

        let old_bitmap = unsafe { SelectObject(mem_dc, dib) };
        Ok(Self {
            mem_dc,
            dib,
            old_bitmap,
            bits: bits as *mut u8,
            size_bytes: (width as usize)
                .saturating_mul(height as usize)
                .saturating_mul(4),
        })
    }

    fn pixels_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.bits, self.size_bytes) }
    }
}

impl Drop for DibSection {
    fn drop(&mut self) {
        unsafe {
            let _ = SelectObject(self.mem_dc, self.old_bitmap);
            let _ = DeleteObject(self.dib);
            let _ = DeleteDC(self.mem_dc);
        }
        self.bits = ptr::null_mut();
        self.size_bytes = 0;
    }
}

/// Layered, topmost, click-through window covering every monitor.
pub struct LayeredOverlayWindow {
    hwnd: HWND,
    screen: VirtualScreen,
    dib: Option<DibSection>,
}

impl LayeredOverlayWindow {
    pub fn create() -> Result<Self> {
        static REGISTER_CLASS: Once = Once::new();
        let class_name = widestring("FadeInkOverlay");
        let hinstance = unsafe { GetModuleHandleW(PCWSTR::null()) }
            .map_err(|err| anyhow!("GetModuleHandleW failed: {err}"))?;

        REGISTER_CLASS.call_once(|| unsafe {
            let wc = WNDCLASSW {
                hInstance: hinstance.into(),
                lpszClassName: PCWSTR(class_name.as_ptr()),
                lpfnWndProc: Some(overlay_wndproc),
                ..Default::default()
            };
            let _ = RegisterClassW(&wc);
        });

        let screen = VirtualScreen::current();
        let hwnd = unsafe {
            CreateWindowExW(
                compose_overlay_window_ex_style(),
                PCWSTR(class_name.as_ptr()),
                PCWSTR::null(),
                WINDOW_STYLE(WS_POPUP.0),
                screen.x,
                screen.y,
                screen.width,
                screen.height,
                None,
                None,
                hinstance,
                None,
            )
        }
        .map_err(|err| anyhow!("CreateWindowExW failed: {err}"))?;

        let dib = match DibSection::create(screen.width, screen.height) {
            Ok(dib) => dib,
            Err(err) => {
                unsafe {
                    let _ = DestroyWindow(hwnd);
                }
                return Err(err);
            }
        };

        unsafe {
            let _ = SetWindowPos(
                hwnd,
                HWND_TOPMOST,
                screen.x,
                screen.y,
                screen.width,
                screen.height,
                SWP_NOACTIVATE | SWP_SHOWWINDOW,
            );
        }
        tracing::debug!(?screen, "created layered ink overlay window");

        Ok(Self {
            hwnd,
            screen,
            dib: Some(dib),
        })
    }

    fn follow_virtual_screen(&mut self) {
        let screen = VirtualScreen::current();
        if screen == self.screen {
            return;
        }
        tracing::debug!(?screen, "virtual screen changed; resizing ink overlay");
        self.dib = None;
        match DibSection::create(screen.width, screen.height) {
            Ok(dib) => self.dib = Some(dib),
            Err(err) => tracing::warn!(?err, "failed to recreate overlay bitmap"),
        }
        unsafe {
            let _ = SetWindowPos(
                self.hwnd,
                HWND_TOPMOST,
                screen.x,
                screen.y,
                screen.width,
                screen.height,
                SWP_NOACTIVATE | SWP_SHOWWINDOW,
            );
        }
        self.screen = screen;
    }
}

impl OverlaySurface for LayeredOverlayWindow {
    fn viewport(&mut self) -> (u32, u32) {
        pump_overlay_messages();
        self.follow_virtual_screen();
        (self.screen.width as u32, self.screen.height as u32)
    }

    fn present(&mut self, frame: &RenderFrameBuffer) -> Result<()> {
        let Some(dib) = self.dib.as_mut() else {
            return Err(anyhow!("overlay bitmap is not available"));
        };
        let pixels = dib.pixels_mut();
        if pixels.len() != frame.rgba_pixels().len() {
            return Err(anyhow!(
                "frame size {:?} does not match overlay bitmap",
                frame.size()
            ));
        }
        frame.to_premultiplied_bgra(pixels);

        let origin = POINT {
            x: self.screen.x,
            y: self.screen.y,
        };
        let size = SIZE {
            cx: self.screen.width,
            cy: self.screen.height,
        };
        let source = POINT { x: 0, y: 0 };
        let blend = BLENDFUNCTION {
            BlendOp: AC_SRC_OVER as u8,
            BlendFlags: 0,
            SourceConstantAlpha: 255,
            AlphaFormat: AC_SRC_ALPHA as u8,
        };
        unsafe {
            UpdateLayeredWindow(
                self.hwnd,
                HDC::default(),
                Some(&origin as *const POINT),
                Some(&size as *const SIZE),
                dib.mem_dc,
                Some(&source as *const POINT),
                COLORREF(0),
                Some(&blend as *const BLENDFUNCTION),
                ULW_ALPHA,
            )
        }
        .map_err(|err| anyhow!("UpdateLayeredWindow failed: {err}"))
    }

    fn shutdown(&mut self) {
        self.dib = None;
        if !self.hwnd.0.is_null() {
            unsafe {
                let _ = DestroyWindow(self.hwnd);
            }
            self.hwnd = HWND::default();
        }
    }
}

impl Drop for LayeredOverlayWindow {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct HookDispatch {
    enabled: AtomicBool,
    primary_down: AtomicBool,
    sender: Mutex<Option<Sender<InkSample>>>,
}

static HOOK_DISPATCH: OnceCell<HookDispatch> = OnceCell::new();

fn hook_dispatch() -> &'static HookDispatch {
    HOOK_DISPATCH.get_or_init(|| HookDispatch {
        enabled: AtomicBool::new(false),
        primary_down: AtomicBool::new(false),
        sender: Mutex::new(None),
    })
}

fn translate_hook_message(msg: u32, screen_point: (i32, i32), primary_down: bool) -> Option<InkEvent> {
    use windows::Win32::UI::WindowsAndMessaging::{WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MOUSEMOVE};

    let point = VirtualScreen::current().to_local(screen_point);
    match msg {
        WM_LBUTTONDOWN => Some(InkEvent::MouseDown {
            button: MouseButton::Primary,
            point,
        }),
        WM_MOUSEMOVE if primary_down => Some(InkEvent::MouseMove {
            point,
            primary_down,
        }),
        WM_LBUTTONUP => Some(InkEvent::MouseUp {
            button: MouseButton::Primary,
        }),
        _ => None,
    }
}

unsafe extern "system" fn mouse_hook_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    use windows::Win32::UI::WindowsAndMessaging::{
        CallNextHookEx, HC_ACTION, HHOOK, MSLLHOOKSTRUCT, WM_LBUTTONDOWN, WM_LBUTTONUP,
    };

    if n_code == HC_ACTION as i32 {
        let dispatch = hook_dispatch();
        if dispatch.enabled.load(Ordering::Acquire) {
            let msg = w_param.0 as u32;
            if msg == WM_LBUTTONDOWN {
                dispatch.primary_down.store(true, Ordering::Release);
            } else if msg == WM_LBUTTONUP {
                dispatch.primary_down.store(false, Ordering::Release);
            }

            let info = unsafe { &*(l_param.0 as *const MSLLHOOKSTRUCT) };
            let primary_down = dispatch.primary_down.load(Ordering::Acquire);
            if let Some(event) = translate_hook_message(msg, (info.pt.x, info.pt.y), primary_down) {
                if let Ok(guard) = dispatch.sender.try_lock() {
                    if let Some(sender) = guard.as_ref() {
                        let _ = sender.send(InkSample::now(event));
                    }
                }
            }
        }
    }

    // Observe only; the click always reaches the window below.
    unsafe { CallNextHookEx(HHOOK(ptr::null_mut()), n_code, w_param, l_param) }
}

struct HookThread {
    thread_id: u32,
    join: JoinHandle<()>,
}

impl HookThread {
    /// Ends the message loop, which unhooks on its way out, and joins.
    fn stop(self) -> Result<()> {
        use windows::Win32::UI::WindowsAndMessaging::{PostThreadMessageW, WM_QUIT};
        unsafe {
            let _ = PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
        }
        self.join
            .join()
            .map_err(|_| anyhow!("mouse hook thread panicked"))
    }
}

enum HookStartup {
    /// The thread's message queue exists; `WM_QUIT` can reach it from here on.
    Queue(u32),
    Installed,
    Failed(anyhow::Error),
}

/// `WH_MOUSE_LL` input source running its own message loop thread.
#[derive(Default)]
pub struct MouseHookInput {
    hook_thread: Option<HookThread>,
}

impl InputSource for MouseHookInput {
    fn install(&mut self, sender: Sender<InkSample>) -> Result<()> {
        use windows::Win32::System::Threading::GetCurrentThreadId;
        use windows::Win32::UI::WindowsAndMessaging::{
            GetMessageW, SetWindowsHookExW, UnhookWindowsHookEx, PM_NOREMOVE, WH_MOUSE_LL,
        };

        if self.hook_thread.is_some() {
            return Ok(());
        }

        if let Ok(mut slot) = hook_dispatch().sender.lock() {
            *slot = Some(sender);
        }
        hook_dispatch().primary_down.store(false, Ordering::Release);
        hook_dispatch().enabled.store(true, Ordering::Release);

        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<HookStartup>(2);
        let join = std::thread::Builder::new()
            .name("ink-mouse-hook".to_string())
            .spawn(move || {
                let mut msg = MSG::default();
                unsafe {
                    let _ = PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_NOREMOVE);
                }
                let _ = ready_tx.send(HookStartup::Queue(unsafe { GetCurrentThreadId() }));

                let hmodule = match unsafe { GetModuleHandleW(PCWSTR::null()) } {
                    Ok(h) => h,
                    Err(e) => {
                        let _ = ready_tx.send(HookStartup::Failed(anyhow!(e)));
                        return;
                    }
                };
                let hook = match unsafe {
                    SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), hmodule, 0)
                } {
                    Ok(h) if !h.0.is_null() => h,
                    Ok(_) => {
                        let _ = ready_tx.send(HookStartup::Failed(anyhow!(
                            windows::core::Error::from_win32()
                        )));
                        return;
                    }
                    Err(e) => {
                        let _ = ready_tx.send(HookStartup::Failed(anyhow!(e)));
                        return;
                    }
                };
                let _ = ready_tx.send(HookStartup::Installed);

                loop {
                    let r = unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) };
                    if r.0 == 0 || r.0 == -1 {
                        break;
                    }
                    unsafe {
                        let _ = TranslateMessage(&msg);
                        DispatchMessageW(&msg);
                    }
                }

                unsafe {
                    let _ = UnhookWindowsHookEx(hook);
                }
            })
            .map_err(|err| {
                self.disable_dispatch();
                anyhow!("failed to spawn mouse hook thread: {err}")
            })?;

        // The queue signal comes before anything that can block.
        let thread_id = match ready_rx.recv() {
            Ok(HookStartup::Queue(thread_id)) => thread_id,
            _ => {
                self.disable_dispatch();
                let _ = join.join();
                return Err(anyhow!("mouse hook thread exited before creating its queue"));
            }
        };
        let hook_thread = HookThread { thread_id, join };

        match ready_rx.recv_timeout(Duration::from_secs(2)) {
            Ok(HookStartup::Installed) => {}
            Ok(HookStartup::Failed(err)) => {
                self.disable_dispatch();
                let _ = hook_thread.stop();
                return Err(err.context("install low-level mouse hook"));
            }
            Ok(HookStartup::Queue(_)) | Err(_) => {
                self.disable_dispatch();
                if let Err(err) = hook_thread.stop() {
                    tracing::warn!(?err, "mouse hook thread did not stop cleanly");
                }
                return Err(anyhow!("mouse hook thread did not signal readiness"));
            }
        }

        self.hook_thread = Some(hook_thread);
        tracing::debug!("low-level mouse hook installed");
        Ok(())
    }

    fn uninstall(&mut self) -> Result<()> {
        self.disable_dispatch();

        if let Some(hook_thread) = self.hook_thread.take() {
            hook_thread.stop()?;
            tracing::debug!("low-level mouse hook removed");
        }
        Ok(())
    }
}

impl MouseHookInput {
    fn disable_dispatch(&self) {
        let dispatch = hook_dispatch();
        dispatch.enabled.store(false, Ordering::Release);
        dispatch.primary_down.store(false, Ordering::Release);
        if let Ok(mut slot) = dispatch.sender.lock() {
            slot.take();
        }
    }
}
