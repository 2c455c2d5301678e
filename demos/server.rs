use anyhow::{bail, Result};
use oxidbus::{Connection, InterfaceModel, Method, ObjectPathBuf, RequestNameFlags, RequestNameReply, Value};
use oxidbus_core::signature::SignatureBuf;

const NAME: &str = "se.tedro.DBusExample";
const INTERFACE: &str = "se.tedro.DBusExample.Pingable";
const PATH: &str = "/se/tedro/DBusExample";

#[tokio::main]
async fn main() -> Result<()> {
    let connection = Connection::session_bus().await?;

    let reply = connection
        .request_name(NAME, RequestNameFlags::DO_NOT_QUEUE)
        .await?;

    if reply != RequestNameReply::PRIMARY_OWNER {
        bail!("could not acquire name: {reply:?}");
    }

    let ping = Method::new(
        "Ping",
        SignatureBuf::new("u").unwrap(),
        SignatureBuf::new("u").unwrap(),
        Box::new(|args| {
            Box::pin(async move {
                let Some(Value::UInt32(value)) = args.into_iter().next() else {
                    return Err(oxidbus::ErrorKind::InvalidArgs("Ping expects (u)".to_owned()).into());
                };

                Ok(vec![Value::UInt32(value)])
            })
        }),
    );

    let interface = InterfaceModel::new(INTERFACE).with_method(ping);
    connection.export(ObjectPathBuf::new(PATH)?, interface)?;

    // Park this task forever; the background connection actor keeps
    // dispatching incoming calls against the exported interface.
    std::future::pending::<()>().await;
    Ok(())
}
