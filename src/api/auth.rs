//! Authentication endpoints.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Method;

use super::{AuthApi, HttpApi};
use crate::auth::bearer_header;
use crate::errors::ClientError;
use crate::models::{AuthResponse, SignInRequest, SignUpRequest, User};

#[async_trait]
impl AuthApi for HttpApi {
    /// GET /api/auth/me
    async fn profile(&self) -> Result<User, ClientError> {
        self.send(self.request(Method::GET, "/auth/me")).await
    }

    /// POST /api/auth/signin
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let body = SignInRequest { email, password };
        self.send(self.request(Method::POST, "/auth/signin").json(&body))
            .await
    }

    /// POST /api/auth/signup
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthResponse, ClientError> {
        let body = SignUpRequest {
            email,
            password,
            name: display_name,
        };
        self.send(self.request(Method::POST, "/auth/signup").json(&body))
            .await
    }

    /// POST /api/auth/signout
    ///
    /// The credential is passed explicitly: by the time this runs the local copy is gone.
    async fn sign_out(&self, credential: &str) -> Result<(), ClientError> {
        let request = self
            .client
            .post(self.url("/auth/signout"))
            .header(AUTHORIZATION, bearer_header(credential));
        self.send_empty(request).await
    }

    /// DELETE /api/auth/account
    async fn delete_account(&self) -> Result<(), ClientError> {
        self.send_empty(self.request(Method::DELETE, "/auth/account"))
            .await
    }
}
