//! `pfetch control <cmd>` – resize a running pipeline through its control socket.

use anyhow::Result;
use pfetch_core::control::{default_control_socket_path, ControlCommand};
use std::path::Path;

use crate::cli::control_socket;

pub async fn run_control(cmd: ControlCommand, socket: Option<&Path>) -> Result<()> {
    let path = match socket {
        Some(p) => p.to_path_buf(),
        None => default_control_socket_path()?,
    };
    let capacity = control_socket::send_command(&path, cmd).await?;
    println!("capacity {}", capacity);
    Ok(())
}
