use crate::use_cases::HubHandle;

#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
}
