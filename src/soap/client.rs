/*!
The SOAP action client: marshals an [`Action`](crate::model::Action) invocation's `in` arguments,
POSTs it to a service's control URL, and unmarshals the response or maps a fault to
[`Error::Protocol`](crate::error::ProtocolError::Soap).
*/

use crate::error::{invalid_value_for_type, soap_fault};
use crate::model::service::Service;
use crate::soap::envelope::{self, ActionResponse};
use crate::syntax::SOAP_HTTP_HEADER_ACTION;
use crate::types::Value;
use crate::Result;
use std::collections::HashMap;
use std::time::Duration;

/// Construction-site options for SOAP action invocation.
#[derive(Clone, Debug)]
pub struct SoapClientOptions {
    pub timeout: Duration,
}

impl Default for SoapClientOptions {
    fn default() -> Self {
        SoapClientOptions {
            timeout: Duration::from_secs(10),
        }
    }
}

///
/// Invokes actions against a single service's control URL.
///
#[derive(Debug)]
pub struct SoapClient {
    http: reqwest::Client,
}

impl SoapClient {
    pub fn new(options: SoapClientOptions) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(options.timeout).build()?;
        Ok(SoapClient { http })
    }

    /// Invoke `action_name` on `service`, marshalling `in_arguments` against the action's
    /// declared related state variables and unmarshalling the `out` arguments the same way.
    /// Returns [`Error::Protocol`](crate::Error::Protocol) carrying the UPnP error code if the
    /// device returns a SOAP fault.
    pub async fn call(
        &self,
        service: &Service,
        action_name: &str,
        in_arguments: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>> {
        let action = service
            .action(action_name)
            .ok_or_else(|| crate::error::not_found("Action", action_name))?;

        for name in in_arguments.keys() {
            if action.argument(name).map(|a| a.direction()) != Some(crate::model::action::Direction::In) {
                return Err(crate::error::not_found("Argument", name.clone()));
            }
        }

        let mut wire_arguments = Vec::new();
        for argument in action.in_arguments() {
            let value = in_arguments
                .get(argument.name())
                .ok_or_else(|| crate::error::not_found("Argument", argument.name()))?;
            wire_arguments.push((argument.name(), value.to_wire_string()));
        }

        let service_type = service.service_type().to_string();
        let body = envelope::encode_request(&service_type, action_name, &wire_arguments);
        let soap_action = format!("\"{}#{}\"", service_type, action_name);

        debug!("SoapClient::call - POST {} ({})", service.control_url(), soap_action);
        let response = self
            .http
            .post(service.control_url())
            .header("CONTENT-TYPE", "text/xml; charset=\"utf-8\"")
            .header(SOAP_HTTP_HEADER_ACTION, soap_action)
            .body(body)
            .send()
            .await?;
        let text = response.text().await?;

        match envelope::parse_response(&text)? {
            ActionResponse::Fault {
                upnp_error_code,
                description,
            } => {
                warn!("SoapClient::call - {} faulted: {}", action_name, description);
                Err(soap_fault(upnp_error_code, description))
            }
            ActionResponse::Result(fields) => {
                let mut out = HashMap::with_capacity(fields.len());
                for (name, text) in fields {
                    if let Some(argument) = action.argument(&name) {
                        let data_type = argument.related_state_variable().data_type();
                        let value = data_type
                            .parse(&text)
                            .map_err(|_| invalid_value_for_type(name.clone(), text.clone()))?;
                        out.insert(name, value);
                    }
                }
                Ok(out)
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::scpd::{ActionDescription, ArgumentDescription, Direction, StateVariableDescription};
    use crate::model::action::Action;
    use crate::model::service::Service;
    use crate::model::state_variable::StateVariable;
    use crate::types::{DataType, Value};
    use crate::urn::{Kind, Urn};
    use std::sync::Weak;

    #[test]
    fn default_timeout_is_ten_seconds() {
        assert_eq!(SoapClientOptions::default().timeout, Duration::from_secs(10));
    }

    fn fixture_service() -> std::sync::Arc<Service> {
        let variable_description = StateVariableDescription {
            name: "Target".to_string(),
            data_type: DataType::Boolean,
            default_value: None,
            allowed_values: Vec::new(),
            allowed_range: None,
            send_events: false,
            multicast: false,
        };
        let mut state_variables = HashMap::new();
        state_variables.insert(
            "Target".to_string(),
            std::sync::Arc::new(StateVariable::from_description(&variable_description)),
        );

        let action_description = ActionDescription {
            name: "SetTarget".to_string(),
            arguments: vec![ArgumentDescription {
                name: "NewTargetValue".to_string(),
                direction: Direction::In,
                retval: false,
                related_state_variable: "Target".to_string(),
            }],
        };
        let action = Action::from_description(&action_description, &state_variables).unwrap();
        let mut actions = HashMap::new();
        actions.insert(action.name().to_string(), action);

        Service::new(
            "urn:upnp-org:serviceId:SwitchPower".to_string(),
            Urn::new("schemas-upnp-org", Kind::Service, "SwitchPower", "1"),
            "http://192.168.1.1:5885/control".to_string(),
            "http://192.168.1.1:5885/event".to_string(),
            "http://192.168.1.1:5885/scpd.xml".to_string(),
            actions,
            state_variables,
            Weak::new(),
        )
    }

    #[tokio::test]
    async fn call_rejects_an_unknown_argument_name() {
        let client = SoapClient::new(SoapClientOptions::default()).unwrap();
        let service = fixture_service();
        let mut in_arguments = HashMap::new();
        in_arguments.insert("NotADeclaredArgument".to_string(), Value::Boolean(true));

        let err = client.call(&service, "SetTarget", &in_arguments).await.unwrap_err();
        assert!(matches!(err, crate::Error::NotFound { .. }));
    }
}
