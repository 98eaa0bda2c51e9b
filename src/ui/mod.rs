//! UI module for rendering the TUI

mod auth;
mod feed;
mod layout;

use crate::app::App;
use crate::state::View;
use ratatui::Frame;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
    let (main_area, status_area) = layout::create_layout(frame.area());

    match &app.state.current_view {
        View::Auth => auth::draw(frame, main_area, app),
        View::Feed => feed::draw(frame, main_area, app),
        View::SignalDetail => feed::draw_detail(frame, main_area, app),
    }

    layout::draw_status_bar(frame, status_area, app);
}
