// Shopping cart demo tools
//
// The cart lives in the agent state as a serialized `CartState`. Each tool
// decodes it, applies one change and hands the whole cart back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tooloop_core::{
    AgentState, Capability, StatefulExecute, ToolDefinition, ToolExecutionResult,
};

pub const SYSTEM_PROMPT: &str = "\
You are a shopping assistant that helps users manage their shopping cart.

These are the actions you can perform:
- AddItem: Add an item to the cart with a name, price, and quantity
- RemoveItem: Remove an item completely from the cart
- UpdateQuantity: Change the quantity of an item in the cart
- ApplyDiscount: Apply a percentage discount to the entire cart
- ShowCart: Display the current contents and total of the cart
- Checkout: Complete the purchase and show the final receipt
- TaskComplete: Signal the end of the task based on the user's request

When you are done with a user's request, use the `TaskComplete` tool.
When the user is done shopping and ready to pay, use the `Checkout` tool.";

pub const DEFAULT_INSTRUCTIONS: &[&str] = &[
    "Add a laptop that costs $999.99",
    "Add 3 books at $14.99 each",
    "Add a pair of headphones for $79.95",
    "Show me what's in my cart",
    "I changed my mind - update the book quantity to 2",
    "Apply a 10% discount since I'm a loyal customer",
    "Show me the updated cart",
    "Check out and complete my purchase",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub price: f64,
    pub quantity: u32,
}

impl CartItem {
    fn subtotal(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    pub percentage: f64,
    pub amount: f64,
}

/// Typed view of the agent state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartState {
    #[serde(default)]
    pub cart: BTreeMap<String, CartItem>,
    #[serde(default)]
    pub total: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<Discount>,
    #[serde(default)]
    pub checked_out: bool,
}

impl CartState {
    pub fn from_state(state: &AgentState) -> Result<Self, String> {
        if state.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(state.clone()).map_err(|e| format!("Malformed cart state: {}", e))
    }

    pub fn into_state(self) -> Result<AgentState, String> {
        serde_json::to_value(self).map_err(|e| e.to_string())
    }

    fn item_mut(&mut self, name: &str) -> Result<&mut CartItem, String> {
        self.cart
            .get_mut(name)
            .ok_or_else(|| format!("{} is not in the cart", name))
    }

    /// Text rendering used by the CLI and in receipts
    pub fn render(&self) -> String {
        if self.cart.is_empty() {
            return "Your cart is empty".to_string();
        }

        let mut lines = vec!["------------------------".to_string()];
        for (name, item) in &self.cart {
            lines.push(format!(
                "{}: {} x ${:.2} = ${:.2}",
                name,
                item.quantity,
                item.price,
                item.subtotal()
            ));
        }
        lines.push("------------------------".to_string());

        if let Some(discount) = &self.discount {
            lines.push(format!("Subtotal: ${:.2}", self.total + discount.amount));
            lines.push(format!(
                "Discount: {}% (-${:.2})",
                discount.percentage, discount.amount
            ));
        }
        lines.push(format!("Total: ${:.2}", self.total));

        lines.join("\n")
    }
}

#[derive(Debug, Deserialize)]
struct AddItemArgs {
    item_name: String,
    price: f64,
    quantity: u32,
}

#[derive(Debug, Deserialize)]
struct ItemArgs {
    item_name: String,
}

#[derive(Debug, Deserialize)]
struct UpdateQuantityArgs {
    item_name: String,
    new_quantity: i64,
}

#[derive(Debug, Deserialize)]
struct DiscountArgs {
    discount_percentage: f64,
}

/// The cart operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartAction {
    AddItem,
    RemoveItem,
    UpdateQuantity,
    ApplyDiscount,
    ShowCart,
    Checkout,
    TaskComplete,
}

impl CartAction {
    pub const ALL: [CartAction; 7] = [
        CartAction::AddItem,
        CartAction::RemoveItem,
        CartAction::UpdateQuantity,
        CartAction::ApplyDiscount,
        CartAction::ShowCart,
        CartAction::Checkout,
        CartAction::TaskComplete,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CartAction::AddItem => "AddItem",
            CartAction::RemoveItem => "RemoveItem",
            CartAction::UpdateQuantity => "UpdateQuantity",
            CartAction::ApplyDiscount => "ApplyDiscount",
            CartAction::ShowCart => "ShowCart",
            CartAction::Checkout => "Checkout",
            CartAction::TaskComplete => "TaskComplete",
        }
    }

    fn description(self) -> &'static str {
        match self {
            CartAction::AddItem => "Add an item to the shopping cart",
            CartAction::RemoveItem => "Remove an item from the shopping cart",
            CartAction::UpdateQuantity => "Update the quantity of an item in the cart",
            CartAction::ApplyDiscount => "Apply a discount to the cart total",
            CartAction::ShowCart => "Display the current contents of the shopping cart",
            CartAction::Checkout => "Process the checkout and complete the shopping session",
            CartAction::TaskComplete => "Signal the end of the task",
        }
    }

    fn capability(self) -> Capability {
        match self {
            CartAction::Checkout | CartAction::TaskComplete => Capability::StopStateful,
            _ => Capability::Stateful,
        }
    }

    fn parameters(self) -> Value {
        match self {
            CartAction::AddItem => json!({
                "type": "object",
                "properties": {
                    "item_name": { "type": "string", "description": "Name of the item" },
                    "price": { "type": "number", "description": "Price of the item" },
                    "quantity": { "type": "integer", "description": "Quantity of the item" }
                },
                "required": ["item_name", "price", "quantity"]
            }),
            CartAction::RemoveItem => json!({
                "type": "object",
                "properties": {
                    "item_name": { "type": "string", "description": "Name of the item to remove" }
                },
                "required": ["item_name"]
            }),
            CartAction::UpdateQuantity => json!({
                "type": "object",
                "properties": {
                    "item_name": { "type": "string", "description": "Name of the item" },
                    "new_quantity": { "type": "integer", "description": "New quantity" }
                },
                "required": ["item_name", "new_quantity"]
            }),
            CartAction::ApplyDiscount => json!({
                "type": "object",
                "properties": {
                    "discount_percentage": {
                        "type": "number",
                        "description": "Percentage discount to apply (0-100)"
                    }
                },
                "required": ["discount_percentage"]
            }),
            _ => json!({ "type": "object", "properties": {} }),
        }
    }

    fn apply(self, cart: &mut CartState, arguments: Value) -> Result<(), String> {
        match self {
            CartAction::AddItem => {
                let args: AddItemArgs = decode(arguments)?;
                if args.price < 0.0 {
                    return Err("Price must not be negative".to_string());
                }
                let item = cart.cart.entry(args.item_name).or_insert(CartItem {
                    price: args.price,
                    quantity: 0,
                });
                item.quantity = item
                    .quantity
                    .checked_add(args.quantity)
                    .ok_or_else(|| "Quantity is too large".to_string())?;
                cart.total += args.price * f64::from(args.quantity);
            }
            CartAction::RemoveItem => {
                let args: ItemArgs = decode(arguments)?;
                let item = cart
                    .cart
                    .remove(&args.item_name)
                    .ok_or_else(|| format!("{} is not in the cart", args.item_name))?;
                cart.total -= item.subtotal();
            }
            CartAction::UpdateQuantity => {
                let args: UpdateQuantityArgs = decode(arguments)?;
                let item = cart.item_mut(&args.item_name)?;
                let old_subtotal = item.subtotal();

                if args.new_quantity <= 0 {
                    cart.cart.remove(&args.item_name);
                    cart.total -= old_subtotal;
                } else {
                    item.quantity = u32::try_from(args.new_quantity)
                        .map_err(|_| "Quantity is too large".to_string())?;
                    let new_subtotal = item.subtotal();
                    cart.total += new_subtotal - old_subtotal;
                }
            }
            CartAction::ApplyDiscount => {
                let args: DiscountArgs = decode(arguments)?;
                if cart.cart.is_empty() {
                    return Err("Cart is empty".to_string());
                }
                if !(0.0..=100.0).contains(&args.discount_percentage) {
                    return Err("Discount percentage must be between 0 and 100".to_string());
                }
                if cart.discount.is_some() {
                    return Err("A discount has already been applied".to_string());
                }
                let amount = cart.total * (args.discount_percentage / 100.0);
                cart.discount = Some(Discount {
                    percentage: args.discount_percentage,
                    amount,
                });
                cart.total -= amount;
            }
            CartAction::Checkout => {
                if cart.cart.is_empty() {
                    return Err("Cannot checkout: Your cart is empty".to_string());
                }
                cart.checked_out = true;
            }
            CartAction::ShowCart | CartAction::TaskComplete => {}
        }
        Ok(())
    }
}

fn decode<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T, String> {
    serde_json::from_value(arguments).map_err(|e| e.to_string())
}

/// One cart tool
pub struct CartTool(pub CartAction);

#[async_trait]
impl StatefulExecute for CartTool {
    async fn execute(&self, state: AgentState, arguments: Value) -> ToolExecutionResult {
        let mut cart = match CartState::from_state(&state) {
            Ok(cart) => cart,
            Err(message) => return ToolExecutionResult::internal_error_msg(message),
        };

        if let Err(message) = self.0.apply(&mut cart, arguments) {
            return ToolExecutionResult::tool_error(message);
        }

        match cart.into_state() {
            Ok(state) => ToolExecutionResult::success(state),
            Err(message) => ToolExecutionResult::internal_error_msg(message),
        }
    }
}

/// All cart tools, in the order they are offered to the model
pub fn tools() -> tooloop_core::Result<Vec<ToolDefinition>> {
    CartAction::ALL
        .into_iter()
        .map(|action| {
            ToolDefinition::builder(action.name())
                .description(action.description())
                .parameters(action.parameters())
                .capability(action.capability())
                .stateful(CartTool(action))
                .build()
        })
        .collect()
}
