//! Renderer termination as reported by the platform webview.
//!
//! Script evaluation is queued to the webview and succeeds even when its
//! content process has died, so crashes are taken from the native callback:
//! `web-process-terminated` on WebKitGTK and `ProcessFailed` on WebView2.
//! WKWebView offers no hook outside its navigation delegate, which the
//! runtime owns; there the heartbeat timeout covers a dead renderer.

use tauri::WebviewWindow;

use crate::supervisor::PageEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererExit {
    /// Exits requested by the app itself; nothing to recover.
    pub clean: bool,
    pub reason: String,
}

impl RendererExit {
    pub fn crashed(reason: impl Into<String>) -> Self {
        Self {
            clean: false,
            reason: reason.into(),
        }
    }

    pub fn requested(reason: impl Into<String>) -> Self {
        Self {
            clean: true,
            reason: reason.into(),
        }
    }
}

impl From<RendererExit> for PageEvent {
    fn from(exit: RendererExit) -> Self {
        PageEvent::RendererGone {
            clean: exit.clean,
            reason: exit.reason,
        }
    }
}

/// Calls `on_exit` from the UI thread whenever the window's renderer goes
/// away.
#[cfg(target_os = "linux")]
pub fn watch_renderer<F>(window: &WebviewWindow, on_exit: F) -> tauri::Result<()>
where
    F: Fn(RendererExit) + Send + 'static,
{
    use webkit2gtk::WebViewExt;

    window.with_webview(move |webview| {
        webview
            .inner()
            .connect_web_process_terminated(move |_, reason| on_exit(webkit_exit(reason)));
    })
}

#[cfg(target_os = "linux")]
fn webkit_exit(reason: webkit2gtk::WebProcessTerminationReason) -> RendererExit {
    use webkit2gtk::WebProcessTerminationReason as Reason;

    match reason {
        Reason::TerminatedByApi => RendererExit::requested("terminated by api"),
        Reason::Crashed => RendererExit::crashed("web process crashed"),
        Reason::ExceededMemoryLimit => RendererExit::crashed("web process exceeded memory limit"),
        other => RendererExit::crashed(format!("web process terminated ({other:?})")),
    }
}

#[cfg(windows)]
pub fn watch_renderer<F>(window: &WebviewWindow, on_exit: F) -> tauri::Result<()>
where
    F: Fn(RendererExit) + Send + 'static,
{
    window.with_webview(move |webview| {
        // SAFETY: the controller belongs to this live webview and the COM
        // calls run on its UI thread, inside the `with_webview` callback.
        if let Err(err) = unsafe { add_process_failed(&webview, on_exit) } {
            log::warn!("Failed to watch the renderer process: {err}");
        }
    })
}

#[cfg(windows)]
unsafe fn add_process_failed<F>(
    webview: &tauri::webview::PlatformWebview,
    on_exit: F,
) -> windows::core::Result<()>
where
    F: Fn(RendererExit) + Send + 'static,
{
    use webview2_com::{
        Microsoft::Web::WebView2::Win32::{
            COREWEBVIEW2_PROCESS_FAILED_KIND, COREWEBVIEW2_PROCESS_FAILED_KIND_BROWSER_PROCESS_EXITED,
            COREWEBVIEW2_PROCESS_FAILED_KIND_RENDER_PROCESS_EXITED,
            COREWEBVIEW2_PROCESS_FAILED_KIND_RENDER_PROCESS_UNRESPONSIVE,
        },
        ProcessFailedEventHandler,
    };

    let core = webview.controller().CoreWebView2()?;
    let handler = ProcessFailedEventHandler::create(Box::new(move |_sender, args| {
        let mut kind = COREWEBVIEW2_PROCESS_FAILED_KIND::default();
        if let Some(args) = args {
            args.ProcessFailedKind(&mut kind)?;
        }
        let reason = match kind {
            COREWEBVIEW2_PROCESS_FAILED_KIND_RENDER_PROCESS_EXITED => "render process exited",
            COREWEBVIEW2_PROCESS_FAILED_KIND_RENDER_PROCESS_UNRESPONSIVE => {
                "render process unresponsive"
            }
            COREWEBVIEW2_PROCESS_FAILED_KIND_BROWSER_PROCESS_EXITED => "browser process exited",
            _ => "webview process failed",
        };
        on_exit(RendererExit::crashed(reason));
        Ok(())
    }));

    let mut token = 0;
    core.add_ProcessFailed(&handler, &mut token)
}

#[cfg(not(any(target_os = "linux", windows)))]
pub fn watch_renderer<F>(_window: &WebviewWindow, _on_exit: F) -> tauri::Result<()>
where
    F: Fn(RendererExit) + Send + 'static,
{
    log::debug!("No native renderer hook on this platform; relying on heartbeats");
    Ok(())
}
