use relaybot_service::{Handler, Service, ServiceBuilder};

/// `#echo <text>` repeats the text, `#ping` answers `pong`.
pub fn service() -> Service {
    ServiceBuilder::new("echo")
        .on_command(
            "echo",
            Handler::new("echo", |ctx| async move {
                anyhow::Ok(ctx.args().map(str::to_string))
            }),
        )
        .on_command(
            "ping",
            Handler::new("ping", |_ctx| async { anyhow::Ok("pong") }),
        )
        .build()
}
