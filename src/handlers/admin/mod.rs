mod packages;
mod payments;
mod reconciliation;
mod sessions;
mod vouchers;

pub use packages::*;
pub use payments::*;
pub use reconciliation::*;
pub use sessions::*;
pub use vouchers::*;

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

use crate::db::AppState;
use crate::middleware::admin_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/packages", get(list_all_packages).post(create_package))
        .route("/admin/packages/{id}", delete(deactivate_package))
        .route("/admin/payments", get(list_payments))
        .route("/admin/sessions", get(list_sessions))
        .route("/admin/sessions/sweep", post(sweep_sessions))
        .route("/admin/sessions/{id}/disconnect", post(disconnect_session))
        .route("/admin/vouchers", get(list_vouchers).post(issue_vouchers))
        .route("/admin/vouchers/{id}", delete(delete_voucher))
        .route("/admin/reconciliation", get(reconciliation))
        .layer(middleware::from_fn_with_state(state, admin_auth))
}
