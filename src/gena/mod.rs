/*!
GENA eventing: subscribe/renew/unsubscribe over HTTP, the callback server that receives `NOTIFY`
requests, the subscription state machine, and the binding that forwards accepted property updates
into [`model`](crate::model) state variables while keeping the subscription renewed.
*/

pub mod binding;
pub mod server;
pub mod session;
pub mod subscription;

pub use binding::GenaBinding;
pub use server::GenaServer;
pub use session::{GenaSession, GenaSessionOptions};
pub use subscription::{GenaSubscription, SubscriptionEvent, SubscriptionState};
