/*!
Actions and arguments: the invocable operations of a service, each argument tied to the state
variable that defines its type.
*/

use crate::description::scpd::{ActionDescription, Direction as DescriptionDirection};
use crate::error::{not_found, Error};
use crate::model::state_variable::StateVariable;
use std::collections::HashMap;
use std::sync::Arc;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// Argument direction, as declared in the SCPD.
pub type Direction = DescriptionDirection;

/// A single action argument, bound to its related state variable.
#[derive(Clone, Debug)]
pub struct Argument {
    name: String,
    direction: Direction,
    retval: bool,
    related_state_variable: Arc<StateVariable>,
}

/// An invocable action.
#[derive(Clone, Debug)]
pub struct Action {
    name: String,
    arguments: Vec<Argument>,
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl Argument {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_retval(&self) -> bool {
        self.retval
    }

    pub fn related_state_variable(&self) -> &Arc<StateVariable> {
        &self.related_state_variable
    }
}

impl Action {
    /// Build an action from its description, resolving every argument's related state variable
    /// by name against `state_variables`. Fails if any argument names a variable the service
    /// does not declare — this is the invariant that every argument's related state variable
    /// exists in its owning service.
    pub fn from_description(
        description: &ActionDescription,
        state_variables: &HashMap<String, Arc<StateVariable>>,
    ) -> Result<Self, Error> {
        let mut arguments = Vec::with_capacity(description.arguments.len());
        for argument in &description.arguments {
            let related = state_variables
                .get(&argument.related_state_variable)
                .cloned()
                .ok_or_else(|| {
                    not_found(
                        "StateVariable",
                        format!(
                            "{} (referenced by argument {} of action {})",
                            argument.related_state_variable, argument.name, description.name
                        ),
                    )
                })?;
            arguments.push(Argument {
                name: argument.name.clone(),
                direction: argument.direction,
                retval: argument.retval,
                related_state_variable: related,
            });
        }
        Ok(Action {
            name: description.name.clone(),
            arguments,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn in_arguments(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.iter().filter(|a| a.direction == Direction::In)
    }

    pub fn out_arguments(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.iter().filter(|a| a.direction == Direction::Out)
    }

    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.name == name)
    }
}
