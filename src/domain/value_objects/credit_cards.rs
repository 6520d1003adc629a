use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCard {
    pub holder_name: String,
    pub number: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub ccv: String,
}

impl CreditCard {
    pub fn is_complete(&self) -> bool {
        [
            &self.holder_name,
            &self.number,
            &self.expiry_month,
            &self.expiry_year,
            &self.ccv,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCardHolderInfo {
    pub name: String,
    pub email: String,
    pub cpf_cnpj: String,
    pub postal_code: String,
    pub address_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_complement: Option<String>,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_phone: Option<String>,
}

impl CreditCardHolderInfo {
    pub fn is_complete(&self) -> bool {
        [
            &self.name,
            &self.email,
            &self.cpf_cnpj,
            &self.postal_code,
            &self.address_number,
            &self.phone,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenizeCreditCardModel {
    pub customer: String,
    pub credit_card: CreditCard,
    pub credit_card_holder_info: CreditCardHolderInfo,
    pub remote_ip: String,
}
