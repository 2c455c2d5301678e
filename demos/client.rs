use anyhow::Result;
use oxidbus::{Connection, Message, ObjectPathBuf, Value};

const NAME: &str = "se.tedro.DBusExample";
const INTERFACE: &str = "se.tedro.DBusExample.Pingable";
const PATH: &str = "/se/tedro/DBusExample";

#[tokio::main]
async fn main() -> Result<()> {
    let connection = Connection::session_bus().await?;

    let path = ObjectPathBuf::new(PATH)?;
    let call = Message::method_call(path, "Ping")
        .with_destination(NAME)
        .with_interface(INTERFACE)
        .with_body(vec![Value::from(42u32)]);

    let reply = connection.call(call).await?;

    match reply.body.first() {
        Some(Value::UInt32(value)) => {
            dbg!(value);
        }
        _ => anyhow::bail!("Ping reply did not carry a u32"),
    }

    Ok(())
}
