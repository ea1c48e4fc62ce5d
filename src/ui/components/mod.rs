pub mod alert_list;
pub mod day_panel;
pub mod progress_bar;
pub mod session_form;
pub mod session_list;
pub mod summary_panel;
