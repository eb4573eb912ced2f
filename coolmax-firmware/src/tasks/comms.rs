//! Write-complete notifications
//!
//! Drains the completion channel on behalf of the comms link, which acks
//! each finished write to the host with the block's protocol code.

use defmt::*;

use crate::channels::WRITE_COMPLETE;

#[embassy_executor::task]
pub async fn comms_task() {
    info!("Comms task started");

    loop {
        let kind = WRITE_COMPLETE.receive().await;
        info!("Ack write of {} (code {:#04x})", kind, kind.as_u8());
    }
}
